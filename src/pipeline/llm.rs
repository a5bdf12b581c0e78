//! Structured VLM call: drive one request through a transport with retries.
//!
//! ## Retry Strategy
//!
//! Every attempt is a fresh remote call followed by the repair protocol in
//! [`crate::pipeline::repair`]. Transport errors (network, throttling,
//! timeouts) and schema-validation failures are retried until the request's
//! budget of `max_retries + 1` attempts is spent; a new attempt re-samples
//! the model, which is often enough to get well-formed JSON. Authentication
//! and other terminal errors stop the loop at once.
//!
//! Backoff is exponential (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s.

use crate::error::{CallError, CallFailure};
use crate::pipeline::repair::repair_and_parse;
use crate::schema::{OutputSchema, SchemaInstance};
use crate::transport::{VisionReply, VisionRequest, VisionTransport};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, error, warn};

/// A schema instance plus the accounting of the call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredReply {
    pub instance: SchemaInstance,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// 1-based number of the attempt that succeeded.
    pub attempts: u32,
    /// Wall time across all attempts, backoff included.
    pub duration_ms: u64,
}

/// Per-call retry settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBudget {
    /// Total attempts, at least 1.
    pub attempts: u32,
    /// Per-attempt timeout on the remote call.
    pub timeout: Option<Duration>,
    pub backoff_ms: u64,
}

/// Run the retry loop.
///
/// Never panics and never returns partial data: the result is either a
/// validated instance or a [`CallFailure`] carrying the last cause.
pub async fn call_with_retries(
    transport: &dyn VisionTransport,
    request: &VisionRequest,
    schema: &OutputSchema,
    budget: RetryBudget,
) -> Result<StructuredReply, CallFailure> {
    let start = Instant::now();
    let attempts = budget.attempts.max(1);
    let mut last_err: Option<CallError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let backoff = budget
                .backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                schema.name,
                attempt,
                attempts - 1,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = send_once(transport, request, budget.timeout)
            .await
            .and_then(|reply| repair_and_parse(&reply.text, schema).map(|inst| (inst, reply)));

        match outcome {
            Ok((instance, reply)) => {
                let duration = start.elapsed();
                debug!(
                    "{} via {}: {} input tokens, {} output tokens, {:?}",
                    schema.name,
                    transport.name(),
                    reply.input_tokens,
                    reply.output_tokens,
                    duration
                );
                return Ok(StructuredReply {
                    instance,
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    attempts: attempt + 1,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    "{}: attempt {} failed: {}",
                    schema.name,
                    attempt + 1,
                    e
                );
                last_err = Some(e);
            }
            Err(e) => {
                error!(
                    "{}: attempt {} failed, not retrying: {}",
                    schema.name,
                    attempt + 1,
                    e
                );
                return Err(CallFailure::new(attempt + 1, e));
            }
        }
    }

    // All attempts exhausted
    let cause = last_err.unwrap_or_else(|| CallError::Internal("retry loop made no attempt".into()));
    error!(
        "{}: giving up after {} attempt(s): {}",
        schema.name, attempts, cause
    );
    Err(CallFailure::new(attempts, cause))
}

async fn send_once(
    transport: &dyn VisionTransport,
    request: &VisionRequest,
    limit: Option<Duration>,
) -> Result<VisionReply, CallError> {
    match limit {
        None => transport.send(request).await,
        Some(limit) => timeout(limit, transport.send(request))
            .await
            .unwrap_or_else(|_| {
                Err(CallError::transport(format!(
                    "call timed out after {:.1}s",
                    limit.as_secs_f64()
                )))
            }),
    }
}
