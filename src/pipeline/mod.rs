//! Stages of a structured call.
//!
//! ## Data Flow
//!
//! ```text
//! images ──▶ encode ──▶ llm ──▶ repair ──▶ SchemaInstance
//!           (base64)  (VLM,     (fences,
//!                     retries)  backslashes)
//! ```
//!
//! 1. [`encode`]: compress each bitmap (PNG or JPEG) and base64-wrap it for
//!    the request body
//! 2. [`llm`]: drive the remote call with retry/backoff; the only stage with
//!    network I/O
//! 3. [`repair`]: deterministic cleanup of the reply text before it is
//!    parsed against the output schema

pub mod encode;
pub mod llm;
pub mod repair;
