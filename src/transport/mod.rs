//! Remote endpoints: the seams between the retry loop and a hosted model.
//!
//! Two traits keep network code out of the core:
//!
//! * [`SessionFactory`] opens an authenticated session. Opening may block on
//!   credential resolution, and a failure here is an
//!   [`CallError::Authentication`] that is never retried.
//! * [`VisionTransport`] is one request/response round trip: system
//!   instruction + images + prompt text in, first text segment + token counts
//!   out.
//!
//! ## Implementations
//!
//! | Module | Invocation shape |
//! |--------|------------------|
//! | [`bedrock`]  | Raw `InvokeModel` with a serialized Anthropic messages body, scoped to a profile + region |
//! | [`provider`] | Chat-style call through an `edgequake-llm` provider (OpenAI, Anthropic, Gemini, Ollama, …) |
//!
//! [`StaticSession`] wraps an already-built transport, which is how tests
//! inject scripted replies.

pub mod bedrock;
pub mod provider;

use crate::error::CallError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use std::sync::Arc;

/// A fully-prepared single-turn vision request.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub system: String,
    /// Sent before the text, in this order.
    pub images: Vec<EncodedImage>,
    pub text: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// What a transport extracted from a successful round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionReply {
    /// The first text segment of the model's reply.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One request/response round trip to a multimodal model.
#[async_trait]
pub trait VisionTransport: Send + Sync {
    /// Short label for logs, e.g. `"bedrock:research@us-west-2"`.
    fn name(&self) -> &str;

    async fn send(&self, request: &VisionRequest) -> Result<VisionReply, CallError>;
}

/// Opens authenticated sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn VisionTransport>, CallError>;
}

/// A factory that always hands out the same pre-built transport.
#[derive(Clone)]
pub struct StaticSession(pub Arc<dyn VisionTransport>);

#[async_trait]
impl SessionFactory for StaticSession {
    async fn open(&self) -> Result<Arc<dyn VisionTransport>, CallError> {
        Ok(Arc::clone(&self.0))
    }
}
