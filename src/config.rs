//! Configuration types for structured vision calls.
//!
//! Session-level settings live in [`CallerConfig`], built via its
//! [`CallerConfigBuilder`]. Per-call settings (prompt, images, schema,
//! retry budget, timeout) belong to [`crate::request::CallRequest`] instead,
//! so one caller can serve many differently-shaped requests.

use crate::error::CallError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Bedrock model identifier.
pub const DEFAULT_MODEL: &str = "anthropic.claude-3-7-sonnet-20250219-v1:0";

/// Configuration shared by every call made through one
/// [`crate::caller::StructuredVisionCaller`].
///
/// # Example
/// ```rust
/// use vision_structured::CallerConfig;
///
/// let config = CallerConfig::builder()
///     .profile("research")
///     .region("us-west-2")
///     .max_tokens(4096)
///     .build()
///     .unwrap();
/// assert_eq!(config.region.as_deref(), Some("us-west-2"));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerConfig {
    /// Model identifier sent with every request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Named credential profile (e.g. an entry in `~/.aws/config`).
    /// If None, the default credential chain is used.
    pub profile: Option<String>,

    /// Region the endpoint lives in. If None, taken from the profile or environment.
    pub region: Option<String>,

    /// Maximum tokens the model may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Structured extraction wants the most likely reading of the image;
    /// retries still re-sample because providers are not bit-for-bit
    /// deterministic at zero temperature.
    pub temperature: f32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// How images are compressed before base64 encoding. Default: PNG.
    pub image_format: ImageFormat,

    /// Use-LLM toggle. When false every call fails fast with
    /// [`CallError::Disabled`] and no network I/O happens. Default: true.
    pub enabled: bool,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            profile: None,
            region: None,
            max_tokens: 8192,
            temperature: 0.0,
            retry_backoff_ms: 500,
            image_format: ImageFormat::default(),
            enabled: true,
        }
    }
}

impl fmt::Debug for CallerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerConfig")
            .field("model", &self.model)
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("image_format", &self.image_format)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl CallerConfig {
    /// Create a new builder for `CallerConfig`.
    pub fn builder() -> CallerConfigBuilder {
        CallerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Human-readable `profile@region` label used in logs and auth errors.
    pub fn session_label(&self) -> String {
        format!(
            "{}@{}",
            self.profile.as_deref().unwrap_or("default"),
            self.region.as_deref().unwrap_or("default-region")
        )
    }
}

/// Builder for [`CallerConfig`].
#[derive(Debug)]
pub struct CallerConfigBuilder {
    config: CallerConfig,
}

impl CallerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.profile = Some(profile.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn enabled(mut self, v: bool) -> Self {
        self.config.enabled = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CallerConfig, CallError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(CallError::InvalidConfig("Model identifier is empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(CallError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if let ImageFormat::Jpeg { quality } = c.image_format {
            if !(1..=100).contains(&quality) {
                return Err(CallError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {}",
                    quality
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Compression applied to bitmaps before they are base64-encoded.
///
/// PNG keeps rendered text crisp. JPEG trades fidelity for much smaller
/// request bodies on photo-like page regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Lossless PNG (default).
    #[default]
    Png,
    /// Lossy JPEG at the given quality (1–100).
    Jpeg { quality: u8 },
}

impl ImageFormat {
    /// MIME type announced to the endpoint.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = CallerConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.max_tokens, 8192);
        assert_eq!(c.temperature, 0.0);
        assert!(c.enabled);
        assert_eq!(c.image_format, ImageFormat::Png);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = CallerConfig::builder().temperature(3.5).build().unwrap();
        assert_eq!(c.temperature, 1.0);
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = CallerConfig::builder().model("  ").build().unwrap_err();
        assert!(matches!(err, CallError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_bad_jpeg_quality() {
        let err = CallerConfig::builder()
            .image_format(ImageFormat::Jpeg { quality: 0 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("JPEG quality"), "got: {err}");
    }

    #[test]
    fn session_label_falls_back_to_defaults() {
        assert_eq!(
            CallerConfig::default().session_label(),
            "default@default-region"
        );
        let c = CallerConfig::builder()
            .profile("ocr")
            .region("eu-central-1")
            .build()
            .unwrap();
        assert_eq!(c.session_label(), "ocr@eu-central-1");
    }
}
