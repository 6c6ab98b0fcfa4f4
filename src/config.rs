//! Configuration types for financial statement extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct for every knob makes it
//! easy to share a config across the concurrently running page tasks.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::provider::ModelOptions;
use std::fmt;
use std::time::Duration;

/// Configuration for one extraction batch.
///
/// # Example
/// ```rust
/// use finstat_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_retries(5)
///     .retry_backoff_ms(1000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants the model to copy what it sees, so sampling
    /// variance is kept at zero unless the caller insists otherwise.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page.
    ///
    /// Default: `None`, meaning the provider's own cap (8192, or 4096 for
    /// Anthropic). A dense balance sheet page serialised as JSON rows easily
    /// runs past 4 000 tokens; truncation leaves unparseable JSON behind.
    pub max_tokens: Option<u32>,

    /// Retries per page after a rate-limit response. Default: 3.
    ///
    /// Only rate-limit failures are retried. Any other provider error or an
    /// unparseable answer fails the page on the first attempt.
    pub max_retries: u32,

    /// Backoff unit in milliseconds. Default: 2000.
    ///
    /// The wait before retry *n* is `n × retry_backoff_ms` (2 s → 4 s → 6 s).
    pub retry_backoff_ms: u64,

    /// Per-request HTTP timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Timeout for downloading page images given as URLs. Default: 60.
    pub download_timeout_secs: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Receives per-page progress and retry warnings.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            max_retries: 3,
            retry_backoff_ms: 2000,
            request_timeout_secs: 120,
            download_timeout_secs: 60,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Settings handed to the provider clients.
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_tokens == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        if c.system_prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig(
                "system prompt override is empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extraction_contract() {
        let c = ExtractionConfig::default();
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 2000);
    }

    #[test]
    fn output_cap_is_left_to_the_provider_by_default() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_tokens, None);
        assert_eq!(c.model_options().max_tokens, None);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ExtractionConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        assert!(matches!(
            ExtractionConfig::builder().max_tokens(0).build(),
            Err(ExtractError::InvalidConfig(_))
        ));
    }

    #[test]
    fn blank_system_prompt_is_rejected() {
        assert!(ExtractionConfig::builder().system_prompt("  ").build().is_err());
    }

    #[test]
    fn model_options_follow_config() {
        let c = ExtractionConfig::builder()
            .max_tokens(1024)
            .request_timeout_secs(30)
            .build()
            .unwrap();
        let opts = c.model_options();
        assert_eq!(opts.max_tokens, Some(1024));
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.temperature, 0.0);
    }
}
