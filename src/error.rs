//! Error types for the vision-structured library.
//!
//! Two types reflect two levels of failure:
//!
//! * [`CallError`] is **per attempt**: one thing went wrong (credentials,
//!   network, unparseable reply). The retry loop inspects it to decide
//!   whether another attempt is worthwhile.
//!
//! * [`CallFailure`] is **terminal**: the invocation is over and produced no
//!   structured data. It records how many remote attempts were made and the
//!   last cause, and is the only error a caller of
//!   [`crate::caller::StructuredVisionCaller::invoke`] ever sees.

use thiserror::Error;

/// A single failure observed while setting up or performing a call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    // ── Remote errors ─────────────────────────────────────────────────────
    /// Credential resolution or session setup failed. Never retried.
    #[error("Authentication failed for '{target}': {detail}")]
    Authentication { target: String, detail: String },

    /// Network error, throttling, server error or timeout from the remote call.
    #[error("Transport error: {detail}")]
    Transport { detail: String },

    /// The reply could not be coerced into the output schema, even after repair.
    #[error("Response did not match schema '{schema}': {detail}")]
    SchemaValidation { schema: String, detail: String },

    // ── Local errors ──────────────────────────────────────────────────────
    /// An image could not be encoded for transport.
    #[error("Image {index} could not be encoded: {detail}")]
    ImageEncoding { index: usize, detail: String },

    /// The request failed builder validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller configuration failed builder validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// LLM calls are switched off in the configuration.
    #[error("LLM calls are disabled")]
    Disabled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// Whether another attempt may produce a different outcome.
    ///
    /// Transport errors are transient; schema failures re-sample the model,
    /// whose output is not deterministic. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallError::Transport { .. } | CallError::SchemaValidation { .. }
        )
    }

    /// Shorthand for a [`CallError::Transport`].
    pub fn transport(detail: impl Into<String>) -> Self {
        CallError::Transport {
            detail: detail.into(),
        }
    }
}

/// The terminal outcome of an invocation that produced no structured result.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Structured call failed after {attempts} attempt(s): {cause}")]
pub struct CallFailure {
    /// Number of remote calls actually issued (0 if setup failed).
    pub attempts: u32,
    /// The last error observed.
    #[source]
    pub cause: CallError,
}

impl CallFailure {
    pub fn new(attempts: u32, cause: CallError) -> Self {
        Self { attempts, cause }
    }

    /// True when the failure came from credentials or session setup.
    pub fn is_authentication(&self) -> bool {
        matches!(self.cause, CallError::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CallError::transport("connection reset").is_retryable());
        assert!(CallError::SchemaValidation {
            schema: "Summary".into(),
            detail: "missing field".into()
        }
        .is_retryable());
        assert!(!CallError::Authentication {
            target: "default@us-east-1".into(),
            detail: "expired token".into()
        }
        .is_retryable());
        assert!(!CallError::Disabled.is_retryable());
    }

    #[test]
    fn failure_display_includes_attempts_and_cause() {
        let f = CallFailure::new(3, CallError::transport("HTTP 503"));
        let msg = f.to_string();
        assert!(msg.contains("3 attempt"), "got: {msg}");
        assert!(msg.contains("HTTP 503"), "got: {msg}");
    }

    #[test]
    fn auth_display() {
        let e = CallError::Authentication {
            target: "research@eu-west-1".into(),
            detail: "no credentials in profile".into(),
        };
        assert!(e.to_string().contains("research@eu-west-1"));
        assert!(CallFailure::new(0, e).is_authentication());
    }
}
