//! Provider adapter: one capability, several vendors.
//!
//! Every vendor sits behind [`ChatModel`]: given a system prompt and user
//! turns (text plus at most one image each), return the completion text.
//! [`resolve_model`] is the registry that maps a provider identifier and its
//! credentials to a ready handle. Building a handle never touches the network.
//!
//! ```text
//! "openai"    ──▶ OpenAiModel     (chat/completions, data-URL image_url)
//! "custom"    ──▶ OpenAiModel     (same wire shape, caller's endpoint)
//! "anthropic" ──▶ AnthropicModel  (/v1/messages, base64 image source)
//! "gemini"    ──▶ GeminiModel     (generateContent, inlineData)
//! ```

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicModel;
pub use gemini::GeminiModel;
pub use openai::OpenAiModel;

use crate::credentials::ProviderCredentials;
use crate::error::{ExtractError, ModelError};
use crate::tables::PageImage;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// The single capability the pipeline needs from a model vendor.
///
/// Implementations must be safe to share across concurrently running page
/// extractions; one handle serves a whole batch.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider identifier, e.g. `"openai"`.
    fn provider(&self) -> &str;

    /// Model identifier sent to the endpoint.
    fn model_name(&self) -> &str;

    /// Run one completion and return its text.
    async fn invoke(&self, system_prompt: &str, messages: &[UserMessage])
        -> Result<String, ModelError>;
}

/// A user turn: instruction text and an optional page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub text: String,
    pub image: Option<PageImage>,
}

impl UserMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(text: impl Into<String>, image: PageImage) -> Self {
        Self {
            text: text.into(),
            image: Some(image),
        }
    }
}

/// Sampling and transport settings shared by all provider clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub temperature: f32,
    /// Output token cap; `None` takes the provider's [`ProviderKind::default_max_tokens`].
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ModelOptions {
    /// Output token cap sent to a provider of the given kind.
    pub fn max_tokens_for(&self, kind: ProviderKind) -> u32 {
        self.max_tokens.unwrap_or(kind.default_max_tokens())
    }
}

/// Recognised provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    /// Any OpenAI-compatible endpoint (proxies, self-hosted gateways).
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Custom,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Custom => "custom",
        }
    }

    /// Model used when the credentials do not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20240620",
            ProviderKind::Gemini => "gemini-1.5-pro",
            ProviderKind::Custom => "proxy-model",
        }
    }

    /// Output token cap used when the caller does not set one.
    ///
    /// Claude 3.5 Sonnet rejects anything above 4096 without a beta header.
    pub fn default_max_tokens(self) -> u32 {
        match self {
            ProviderKind::Anthropic => 4096,
            ProviderKind::OpenAi | ProviderKind::Gemini | ProviderKind::Custom => 8192,
        }
    }

    /// Endpoint used when the credentials do not override it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::Custom => openai::DEFAULT_BASE_URL,
            ProviderKind::Anthropic => anthropic::DEFAULT_BASE_URL,
            ProviderKind::Gemini => gemini::DEFAULT_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "custom" => Ok(ProviderKind::Custom),
            _ => Err(ExtractError::UnsupportedProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// Resolve a provider identifier and its credentials into a model handle.
///
/// `credentials.model_name` and `credentials.base_url` override the
/// provider's defaults when present.
///
/// # Errors
/// [`ExtractError::UnsupportedProvider`] for an unknown identifier, or
/// [`ExtractError::Internal`] if the HTTP client cannot be built.
pub fn resolve_model(
    provider_id: &str,
    credentials: &ProviderCredentials,
    options: &ModelOptions,
) -> Result<Arc<dyn ChatModel>, ExtractError> {
    let kind: ProviderKind = provider_id.parse()?;
    let model = credentials
        .model_name
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(kind.default_model())
        .to_string();
    let base_url = normalise_base_url(
        credentials
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(kind.default_base_url()),
    );
    let client = build_http_client(options.timeout)?;

    let handle: Arc<dyn ChatModel> = match kind {
        ProviderKind::OpenAi | ProviderKind::Custom => Arc::new(OpenAiModel::new(
            kind,
            client,
            &credentials.api_key,
            base_url,
            model,
            options,
        )),
        ProviderKind::Anthropic => Arc::new(AnthropicModel::new(
            client,
            &credentials.api_key,
            base_url,
            model,
            options,
        )),
        ProviderKind::Gemini => Arc::new(GeminiModel::new(
            client,
            &credentials.api_key,
            base_url,
            model,
            options,
        )),
    };
    Ok(handle)
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))
}

fn normalise_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Turn a non-success response into [`ModelError::Http`], keeping the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Http {
        status: status.as_u16(),
        body,
    })
}
