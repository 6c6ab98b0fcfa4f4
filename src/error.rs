//! Error types for the finstat-extract library.
//!
//! Errors are layered the same way the pipeline is:
//!
//! * [`ExtractError`] — **Fatal**: returned from the public entry points.
//!   Any single page failing permanently fails the whole batch, so a page
//!   failure reaches the caller as [`ExtractError::PageExtraction`] carrying
//!   the 1-based page number.
//!
//! * [`PageError`] — the page-scoped cause inside a `PageExtraction` error
//!   (rate limit exhausted, provider error, unparseable output).
//!
//! * [`ParseError`] — the model answered but its text could not be coerced
//!   into the expected JSON shape.
//!
//! * [`ModelError`] — a provider client failed to produce a completion.
//!   [`ModelError::is_rate_limited`] is the single place that decides whether
//!   a failure is worth retrying.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the finstat-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Provider errors ───────────────────────────────────────────────────
    /// The credential store has no API key for the provider.
    #[error("API key for provider '{provider}' is not configured.\nAdd one with: finstat keys set --provider {provider} --api-key <KEY>")]
    CredentialsMissing { provider: String },

    /// The provider identifier is not in the registry.
    #[error("Unsupported AI provider: {provider}\nSupported: openai, anthropic, gemini, custom")]
    UnsupportedProvider { provider: String },

    /// A page failed permanently; the batch is abandoned.
    #[error("Page {page} extraction failed: {source}")]
    PageExtraction {
        page: usize,
        #[source]
        source: PageError,
    },

    /// The connectivity probe against a provider failed.
    #[error("Connection test failed for provider '{provider}': {detail}")]
    ConnectionTest { provider: String, detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// An image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// The bytes are not in an image format the model endpoints accept.
    #[error("Page {page} is not a supported image (PNG, JPEG, GIF or WEBP). First bytes: {magic:?}")]
    UnsupportedImage { page: usize, magic: Vec<u8> },

    /// A data URL or base64 payload could not be decoded.
    #[error("Page {page} has invalid image data: {detail}")]
    InvalidImageData { page: usize, detail: String },

    /// HTTP image download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output or settings file.
    #[error("Failed to write file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// 1-based page number for page-scoped failures.
    pub fn page(&self) -> Option<usize> {
        match self {
            ExtractError::PageExtraction { page, .. }
            | ExtractError::UnsupportedImage { page, .. }
            | ExtractError::InvalidImageData { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// The permanent cause of a single page's failure.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// The provider kept answering with rate-limit errors.
    #[error("rate limited after {retries} retries: {detail}")]
    RateLimited { retries: u32, detail: String },

    /// The provider call failed with a non-retryable error.
    #[error("{detail}")]
    Invocation { detail: String },

    /// The model answered, but not with usable JSON.
    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] ParseError),
}

/// Model output could not be coerced into a page extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing resembling a JSON object was found.
    #[error("no JSON object found in model output")]
    NoJsonObject,

    /// The isolated text is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not the four-array object the prompt asked for.
    #[error("unexpected JSON shape: {0}")]
    UnexpectedShape(String),
}

/// Failure reported by a provider client.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never got a response (DNS, TLS, timeout, …).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the provider's documented shape.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider answered with no text content.
    #[error("provider returned an empty completion")]
    EmptyResponse,
}

impl ModelError {
    /// Whether this failure is a provider rate limit (HTTP 429).
    ///
    /// Providers and proxies disagree on where they put the signal, so the
    /// rendered message is inspected rather than only the status code.
    pub fn is_rate_limited(&self) -> bool {
        if let ModelError::Http { status: 429, .. } = self {
            return true;
        }
        is_rate_limit_message(&self.to_string())
    }
}

/// Classify free-form error text as a rate-limit signal.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.contains("429") || message.to_lowercase().contains("rate limit")
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ModelError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => ModelError::Transport(e.to_string()),
        }
    }
}
