//! # vision-structured
//!
//! Ask a multimodal LLM a question about one or more images and get back a
//! typed, schema-validated object instead of free text.
//!
//! ## Why this crate?
//!
//! Document pipelines keep needing small structured answers from a vision
//! model: "is this crop a table, and if so what is its HTML?", "which of these
//! figures has a caption?". Models are good at the reading but unreliable at
//! the formatting: replies arrive wrapped in Markdown fences, with LaTeX
//! backslashes that break JSON, or occasionally with a field missing. This
//! crate owns that last mile: it tells the model the exact shape to answer
//! with, repairs the usual formatting slips, validates the result and
//! re-samples when validation still fails.
//!
//! ## Call Overview
//!
//! ```text
//! CallRequest (prompt + images + OutputSchema)
//!  │
//!  ├─ 1. Prompt   system instruction embedding the schema as JSON Schema
//!  ├─ 2. Encode   bitmap → PNG/JPEG → base64
//!  ├─ 3. Session  open an authenticated session (profile + region)
//!  ├─ 4. Invoke   one user turn, images first, then text
//!  ├─ 5. Repair   strip ```json fences, escape stray backslashes
//!  └─ 6. Validate parse against the schema; retry on failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vision_structured::{
//!     CallRequest, CallerConfig, FieldType, OutputSchema, RequestImage,
//!     StructuredVisionCaller, UsageMetadata, UsageSink,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CallerConfig::builder()
//!         .profile("research")
//!         .region("us-west-2")
//!         .build()?;
//!     let caller = StructuredVisionCaller::bedrock(config);
//!
//!     let schema = OutputSchema::new("TableCorrection")
//!         .field("corrected_html", FieldType::String)
//!         .optional_field("confidence", FieldType::Number);
//!     let request = CallRequest::builder("Transcribe the table in this image.", schema)
//!         .image(RequestImage::from_path("table.png")?)
//!         .max_retries(2)
//!         .timeout_secs(60.0)
//!         .build()?;
//!
//!     let mut usage = UsageMetadata::default();
//!     let answer = caller
//!         .invoke(&request, Some(&mut usage as &mut dyn UsageSink))
//!         .await?;
//!     println!("{}", answer.get_str("corrected_html").unwrap_or_default());
//!     eprintln!("{} request(s), {} output tokens", usage.request_count, usage.tokens_used);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vision-call` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! vision-structured = { version = "0.1", default-features = false }
//! ```
//!
//! ## Transports
//!
//! | Constructor | Endpoint |
//! |-------------|----------|
//! | [`StructuredVisionCaller::bedrock`] | AWS Bedrock `InvokeModel`, Anthropic messages body |
//! | [`StructuredVisionCaller::provider`] | Any `edgequake-llm` chat provider (OpenAI, Anthropic, Gemini, Ollama, …) |
//! | [`StructuredVisionCaller::new`] | Your own [`SessionFactory`] |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod caller;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod request;
pub mod schema;
pub mod transport;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use caller::{BatchOutcome, StructuredVisionCaller};
pub use config::{CallerConfig, CallerConfigBuilder, ImageFormat, DEFAULT_MODEL};
pub use error::{CallError, CallFailure};
pub use request::{CallRequest, CallRequestBuilder, RequestImage};
pub use schema::{FieldType, OutputSchema, SchemaField, SchemaInstance};
pub use transport::{SessionFactory, StaticSession, VisionReply, VisionRequest, VisionTransport};
pub use usage::{UsageMetadata, UsageSink};
