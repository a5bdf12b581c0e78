//! Chat-style transport through an `edgequake-llm` provider.
//!
//! Useful when the structured call should go to OpenAI, Anthropic, Gemini,
//! Ollama or any other provider `edgequake-llm` knows, instead of Bedrock.
//! The provider owns its own authentication (API key env vars), so building
//! it is the session step here.

use super::{SessionFactory, VisionReply, VisionRequest, VisionTransport};
use crate::error::CallError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Sends vision requests through a chat-completion provider.
pub struct ProviderTransport {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderTransport {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

/// Build the chat messages: system instruction, then one user turn carrying
/// the images and the prompt text.
///
/// Images go at `"high"` detail so small print in page crops stays legible.
fn build_messages(request: &VisionRequest) -> Vec<ChatMessage> {
    let images: Vec<ImageData> = request
        .images
        .iter()
        .map(|img| ImageData::new(img.data.clone(), img.mime_type.as_str()).with_detail("high"))
        .collect();

    vec![
        ChatMessage::system(request.system.as_str()),
        ChatMessage::user_with_images(request.text.as_str(), images),
    ]
}

fn build_options(request: &VisionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl VisionTransport for ProviderTransport {
    fn name(&self) -> &str {
        &self.label
    }

    async fn send(&self, request: &VisionRequest) -> Result<VisionReply, CallError> {
        let messages = build_messages(request);
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CallError::transport(format!("{}: {}", self.label, e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(VisionReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Creates a provider by name and model on each [`SessionFactory::open`].
///
/// Provider construction reads the matching API key from the environment
/// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …); a missing key surfaces as an
/// authentication failure.
pub struct ProviderSessionFactory {
    provider_name: String,
    model: String,
}

impl ProviderSessionFactory {
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SessionFactory for ProviderSessionFactory {
    async fn open(&self) -> Result<Arc<dyn VisionTransport>, CallError> {
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, &self.model)
            .map_err(|e| CallError::Authentication {
                target: self.provider_name.clone(),
                detail: format!("{e}"),
            })?;
        let label = format!("{}:{}", self.provider_name, self.model);
        Ok(Arc::new(ProviderTransport::new(provider, label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedImage;
    use edgequake_llm::ChatRole;

    fn request() -> VisionRequest {
        VisionRequest {
            model: "gpt-4.1-nano".into(),
            system: "answer with JSON".into(),
            images: vec![EncodedImage {
                data: "iVBORw0KGgo=".into(),
                mime_type: "image/png".into(),
            }],
            text: "describe".into(),
            max_tokens: 2048,
            temperature: 0.0,
        }
    }

    #[test]
    fn options_forward_sampling_settings() {
        let opts = build_options(&request());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn messages_are_system_then_user_with_images() {
        let messages = build_messages(&request());
        assert_eq!(messages.len(), 2);

        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "answer with JSON");

        let user = &messages[1];
        assert_eq!(user.role, ChatRole::User);
        assert_eq!(user.content, "describe");
        let images = user.images.as_ref().expect("user turn carries images");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, "iVBORw0KGgo=");
        assert_eq!(images[0].mime_type, "image/png");
        assert_eq!(images[0].detail.as_deref(), Some("high"));
    }
}
