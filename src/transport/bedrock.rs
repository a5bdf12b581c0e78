//! AWS Bedrock transport using the raw `InvokeModel` API.
//!
//! The request body is the Anthropic messages format serialized by hand, so
//! the exact payload (protocol version, max tokens, system instruction, one
//! user turn with images before text, temperature) is under our control and
//! unit-testable without AWS.

use super::{SessionFactory, VisionReply, VisionRequest, VisionTransport};
use crate::config::CallerConfig;
use crate::error::CallError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::Blob;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Protocol version Bedrock requires for Anthropic models.
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Service error codes that mean the caller's identity was rejected.
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "ExpiredTokenException",
    "InvalidSignatureException",
];

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    anthropic_version: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: Vec<WireContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireContent<'a> {
    Image { source: WireImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct WireImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvokeReply {
    #[serde(default)]
    content: Vec<ReplyContent>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ReplyContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Serialize `request` into an `InvokeModel` body.
pub fn build_invoke_body(request: &VisionRequest) -> Result<Vec<u8>, CallError> {
    let mut content: Vec<WireContent<'_>> = request
        .images
        .iter()
        .map(|img| WireContent::Image {
            source: WireImageSource {
                kind: "base64",
                media_type: &img.mime_type,
                data: &img.data,
            },
        })
        .collect();
    content.push(WireContent::Text {
        text: &request.text,
    });

    let body = InvokeBody {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: request.max_tokens,
        system: &request.system,
        messages: vec![WireMessage {
            role: "user",
            content,
        }],
        temperature: request.temperature,
    };

    serde_json::to_vec(&body).map_err(|e| CallError::Internal(format!("request body: {e}")))
}

/// Parse an `InvokeModel` response body, keeping the first text segment.
pub fn parse_invoke_reply(body: &[u8]) -> Result<VisionReply, CallError> {
    let reply: InvokeReply = serde_json::from_slice(body)
        .map_err(|e| CallError::transport(format!("malformed response body: {e}")))?;

    let text = reply
        .content
        .into_iter()
        .find_map(|c| match c {
            ReplyContent::Text { text } => Some(text),
            ReplyContent::Other => None,
        })
        .ok_or_else(|| CallError::transport("response contained no text segment"))?;

    let usage = reply.usage.unwrap_or_default();
    Ok(VisionReply {
        text,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    })
}

fn classify_invoke_error<R>(target: &str, err: SdkError<InvokeModelError, R>) -> CallError
where
    R: std::fmt::Debug + 'static,
{
    let is_auth = err.as_service_error().is_some_and(|se| {
        se.is_access_denied_exception() || se.code().is_some_and(|c| AUTH_ERROR_CODES.contains(&c))
    });
    let detail = DisplayErrorContext(&err).to_string();
    if is_auth {
        CallError::Authentication {
            target: target.to_string(),
            detail,
        }
    } else {
        CallError::Transport { detail }
    }
}

// ── Transport ────────────────────────────────────────────────────────────

/// An open Bedrock runtime session.
pub struct BedrockTransport {
    client: BedrockClient,
    label: String,
}

impl BedrockTransport {
    pub fn new(client: BedrockClient, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionTransport for BedrockTransport {
    fn name(&self) -> &str {
        &self.label
    }

    async fn send(&self, request: &VisionRequest) -> Result<VisionReply, CallError> {
        let body = build_invoke_body(request)?;
        debug!(
            "{}: invoking {} with {} image(s), {} body bytes",
            self.label,
            request.model,
            request.images.len(),
            body.len()
        );

        let output = self
            .client
            .invoke_model()
            .model_id(&request.model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| classify_invoke_error(&self.label, e))?;

        parse_invoke_reply(output.body().as_ref())
    }
}

// ── Session factory ──────────────────────────────────────────────────────

/// Opens Bedrock sessions for a named profile and region.
///
/// The first successful [`SessionFactory::open`] resolves credentials and
/// builds the client; later calls reuse it.
pub struct BedrockSessionFactory {
    profile: Option<String>,
    region: Option<String>,
    label: String,
    client: OnceCell<BedrockClient>,
}

impl BedrockSessionFactory {
    pub fn new(config: &CallerConfig) -> Self {
        Self {
            profile: config.profile.clone(),
            region: config.region.clone(),
            label: format!("bedrock:{}", config.session_label()),
            client: OnceCell::new(),
        }
    }

    fn auth_error(&self, detail: impl Into<String>) -> CallError {
        CallError::Authentication {
            target: self.label.clone(),
            detail: detail.into(),
        }
    }

    async fn connect(&self) -> Result<BedrockClient, CallError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref profile) = self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(ref region) = self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(self.auth_error(
                "no region configured; set a region or AWS_REGION",
            ));
        }

        // Resolve credentials now so a bad profile fails here, not on the first call.
        let provider = sdk_config
            .credentials_provider()
            .ok_or_else(|| self.auth_error("no credentials provider configured"))?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| self.auth_error(DisplayErrorContext(&e).to_string()))?;

        info!("Opened Bedrock session {}", self.label);
        Ok(BedrockClient::new(&sdk_config))
    }
}

#[async_trait]
impl SessionFactory for BedrockSessionFactory {
    async fn open(&self) -> Result<Arc<dyn VisionTransport>, CallError> {
        let client = self.client.get_or_try_init(|| self.connect()).await?;
        Ok(Arc::new(BedrockTransport::new(
            client.clone(),
            self.label.clone(),
        )))
    }
}
