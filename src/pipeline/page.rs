//! Page extraction: one page image in, one [`RawPageExtraction`] out.
//!
//! ## Retry Strategy
//!
//! Under concurrent load providers answer with HTTP 429. Those failures are
//! retried with a *linear* backoff: retry *n* waits `n × retry_backoff_ms`
//! (2 s → 4 s → 6 s with defaults), up to `max_retries` times. Anything else
//! (bad key, server error, unparseable output) fails the page immediately.
//!
//! The retry loop is a small state machine:
//!
//! ```text
//!            ┌────────── rate limited, retries left ──────────┐
//!            ▼                                                │
//!   ──▶ Attempting ──ok──▶ parse ──ok──▶ Succeeded      BackingOff
//!            │                │                               ▲
//!            │                └──err──▶ PermanentlyFailed     │
//!            └── other error / ceiling reached ──▶ PermanentlyFailed
//! ```
//!
//! [`RetryPolicy::decide`] holds the ceiling and the backoff formula so both
//! can be tested without a model.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ModelError, PageError};
use crate::pipeline::parse::parse_response;
use crate::progress::ExtractionWarning;
use crate::prompts::{page_message, DEFAULT_SYSTEM_PROMPT};
use crate::provider::ChatModel;
use crate::tables::{PageImage, RawPageExtraction};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Outcome of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then make retry number `retry` (1-based).
    BackOff { retry: u32, wait: Duration },
    /// The failure is permanent for this page.
    GiveUp,
}

/// Retry ceiling and linear backoff for rate-limited attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_unit: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Decide what follows a failed attempt, given the retries already made.
    pub fn decide(&self, retries_so_far: u32, rate_limited: bool) -> RetryDecision {
        if !rate_limited || retries_so_far >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        let retry = retries_so_far + 1;
        RetryDecision::BackOff {
            retry,
            wait: self.backoff_unit.saturating_mul(retry),
        }
    }
}

/// Extract the financial tables visible on one page.
///
/// Sends the system instruction plus one user turn (instruction text and the
/// page image), retrying rate-limited calls per [`RetryPolicy`]. Each retry
/// emits an [`ExtractionWarning`] through the configured progress callback.
///
/// # Errors
/// [`ExtractError::PageExtraction`] naming the 1-based page number and the
/// underlying [`PageError`].
pub async fn extract_page(
    model: &dyn ChatModel,
    image: &PageImage,
    total_pages: usize,
    config: &ExtractionConfig,
) -> Result<RawPageExtraction, ExtractError> {
    let page_num = image.page_num();
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let messages = [page_message(image)];
    let policy = RetryPolicy::from_config(config);
    let fail = |source: PageError| ExtractError::PageExtraction {
        page: page_num,
        source,
    };

    let mut retries = 0;
    loop {
        debug!(
            "Extracting page {}/{} (attempt {})",
            page_num,
            total_pages,
            retries + 1
        );

        let err = match model.invoke(system_prompt, &messages).await {
            Ok(text) => {
                let extraction = parse_response(&text).map_err(|e| {
                    warn!("Page {}: unusable model output: {}", page_num, e);
                    fail(PageError::MalformedResponse(e))
                })?;
                debug!(
                    "Page {}: {} rows in {:?}",
                    page_num,
                    extraction.row_count(),
                    start.elapsed()
                );
                return Ok(extraction);
            }
            Err(e) => e,
        };

        match policy.decide(retries, err.is_rate_limited()) {
            RetryDecision::BackOff { retry, wait } => {
                let warning = ExtractionWarning {
                    page: page_num,
                    retry,
                    max_retries: policy.max_retries,
                    wait,
                };
                warn!("{}", warning);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_warning(&warning);
                }
                sleep(wait).await;
                retries = retry;
            }
            RetryDecision::GiveUp => {
                warn!("Page {}: attempt {} failed — {}", page_num, retries + 1, err);
                return Err(fail(permanent_cause(err, retries)));
            }
        }
    }
}

fn permanent_cause(err: ModelError, retries: u32) -> PageError {
    if err.is_rate_limited() {
        PageError::RateLimited {
            retries,
            detail: err.to_string(),
        }
    } else {
        PageError::Invocation {
            detail: err.to_string(),
        }
    }
}
