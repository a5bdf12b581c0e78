//! The public entry point: one prompt + images in, one schema instance out.

use crate::config::CallerConfig;
use crate::error::{CallError, CallFailure};
use crate::pipeline::encode::encode_image;
use crate::pipeline::llm::{call_with_retries, RetryBudget};
use crate::prompts::system_instruction;
use crate::request::CallRequest;
use crate::schema::SchemaInstance;
use crate::transport::bedrock::BedrockSessionFactory;
use crate::transport::provider::ProviderSessionFactory;
use crate::transport::{SessionFactory, VisionRequest};
use crate::usage::{UsageMetadata, UsageSink};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Issues structured multimodal calls.
///
/// Holds no per-call state, so one caller can serve any number of
/// concurrent [`invoke`](Self::invoke)s. Cloning is cheap.
#[derive(Clone)]
pub struct StructuredVisionCaller {
    config: CallerConfig,
    sessions: Arc<dyn SessionFactory>,
}

/// Result of one request in [`StructuredVisionCaller::invoke_batch`].
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position of the request in the input.
    pub index: usize,
    pub result: Result<SchemaInstance, CallFailure>,
    /// Usage spent on this request alone.
    pub usage: UsageMetadata,
}

impl StructuredVisionCaller {
    pub fn new(config: CallerConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self { config, sessions }
    }

    /// Caller backed by AWS Bedrock, scoped to `config.profile` and `config.region`.
    pub fn bedrock(config: CallerConfig) -> Self {
        let sessions = Arc::new(BedrockSessionFactory::new(&config));
        Self::new(config, sessions)
    }

    /// Caller backed by an `edgequake-llm` provider (`"openai"`, `"anthropic"`,
    /// `"gemini"`, `"ollama"`, …) running `config.model`.
    pub fn provider(config: CallerConfig, provider_name: impl Into<String>) -> Self {
        let sessions = Arc::new(ProviderSessionFactory::new(
            provider_name,
            config.model.clone(),
        ));
        Self::new(config, sessions)
    }

    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// Run one structured call.
    ///
    /// On success the returned instance has been validated against the
    /// request's schema, and `usage` (if given) is credited with one request
    /// and the reply's output tokens. On failure nothing partial is returned
    /// and `usage` is left untouched.
    ///
    /// # Errors
    /// * [`CallError::Disabled`]: LLM calls are switched off; no I/O happened.
    /// * [`CallError::ImageEncoding`]: an image could not be encoded; no remote call was made.
    /// * [`CallError::Authentication`]: the session could not be opened, or the
    ///   endpoint rejected the caller's identity. Never retried.
    /// * [`CallError::Transport`] / [`CallError::SchemaValidation`]: the last
    ///   cause after every attempt failed.
    pub async fn invoke(
        &self,
        request: &CallRequest,
        usage: Option<&mut dyn UsageSink>,
    ) -> Result<SchemaInstance, CallFailure> {
        let schema = request.schema();

        if !self.config.enabled {
            debug!("{}: LLM calls disabled, skipping", schema.name);
            return Err(CallFailure::new(0, CallError::Disabled));
        }

        info!(
            "Structured call '{}' with {} image(s), up to {} attempt(s)",
            schema.name,
            request.images().len(),
            request.attempts()
        );

        let images = request
            .images()
            .iter()
            .enumerate()
            .map(|(index, img)| {
                encode_image(img, self.config.image_format).map_err(|e| CallError::ImageEncoding {
                    index,
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!("{}: {}", schema.name, e);
                CallFailure::new(0, e)
            })?;

        let transport = self.sessions.open().await.map_err(|e| {
            error!("{}: could not open session: {}", schema.name, e);
            CallFailure::new(0, e)
        })?;

        let vision_request = VisionRequest {
            model: self.config.model.clone(),
            system: system_instruction(schema),
            images,
            text: request.prompt().to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let budget = RetryBudget {
            attempts: request.attempts(),
            timeout: request.timeout(),
            backoff_ms: self.config.retry_backoff_ms,
        };

        let reply = call_with_retries(transport.as_ref(), &vision_request, schema, budget).await?;

        if let Some(sink) = usage {
            sink.update_metadata(1, reply.output_tokens);
        }

        info!(
            "Structured call '{}' succeeded on attempt {} ({} input / {} output tokens, {}ms)",
            schema.name,
            reply.attempts,
            reply.input_tokens,
            reply.output_tokens,
            reply.duration_ms
        );

        Ok(reply.instance)
    }

    /// Blocking wrapper around [`invoke`](Self::invoke).
    ///
    /// Creates a temporary tokio runtime internally, so it must not be called
    /// from inside an async context.
    pub fn invoke_blocking(
        &self,
        request: &CallRequest,
        usage: Option<&mut dyn UsageSink>,
    ) -> Result<SchemaInstance, CallFailure> {
        tokio::runtime::Runtime::new()
            .map_err(|e| {
                CallFailure::new(
                    0,
                    CallError::Internal(format!("Failed to create tokio runtime: {}", e)),
                )
            })?
            .block_on(self.invoke(request, usage))
    }

    /// Run independent requests with at most `concurrency` in flight.
    ///
    /// Outcomes come back in input order, each with its own usage totals.
    pub async fn invoke_batch(
        &self,
        requests: Vec<CallRequest>,
        concurrency: usize,
    ) -> Vec<BatchOutcome> {
        let total = requests.len();
        let mut outcomes: Vec<BatchOutcome> =
            stream::iter(requests.into_iter().enumerate().map(|(index, request)| async move {
                let mut usage = UsageMetadata::default();
                let result = self
                    .invoke(&request, Some(&mut usage as &mut dyn UsageSink))
                    .await;
                debug!("Batch item {}/{} finished", index + 1, total);
                BatchOutcome {
                    index,
                    result,
                    usage,
                }
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

impl std::fmt::Debug for StructuredVisionCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredVisionCaller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, OutputSchema};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NeverOpened(AtomicBool);

    #[async_trait]
    impl SessionFactory for NeverOpened {
        async fn open(&self) -> Result<Arc<dyn crate::transport::VisionTransport>, CallError> {
            self.0.store(true, Ordering::SeqCst);
            Err(CallError::Internal("should not be opened".into()))
        }
    }

    fn request() -> CallRequest {
        CallRequest::builder(
            "describe",
            OutputSchema::new("Summary").field("summary", FieldType::String),
        )
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn disabled_caller_does_no_io() {
        let factory = Arc::new(NeverOpened(AtomicBool::new(false)));
        let config = CallerConfig::builder().enabled(false).build().unwrap();
        let caller = StructuredVisionCaller::new(config, factory.clone());

        let mut usage = UsageMetadata::default();
        let err = caller
            .invoke(&request(), Some(&mut usage as &mut dyn UsageSink))
            .await
            .unwrap_err();

        assert_eq!(err.cause, CallError::Disabled);
        assert_eq!(err.attempts, 0);
        assert!(!factory.0.load(Ordering::SeqCst));
        assert_eq!(usage, UsageMetadata::default());
    }

    #[tokio::test]
    async fn session_failure_reports_zero_attempts() {
        let factory = Arc::new(NeverOpened(AtomicBool::new(false)));
        let caller = StructuredVisionCaller::new(CallerConfig::default(), factory.clone());
        let err = caller.invoke(&request(), None).await.unwrap_err();
        assert!(factory.0.load(Ordering::SeqCst));
        assert_eq!(err.attempts, 0);
    }

    #[test]
    fn debug_hides_factory() {
        let caller = StructuredVisionCaller::bedrock(CallerConfig::default());
        let s = format!("{caller:?}");
        assert!(s.starts_with("StructuredVisionCaller"));
    }
}
