//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while a batch runs. Pages are extracted concurrently, so events
//! from different pages arrive interleaved and in no particular order.
//!
//! # Example
//!
//! ```rust
//! use finstat_extract::{ExtractionConfig, ExtractionProgressCallback, ExtractionWarning};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct WarningLog(Mutex<Vec<String>>);
//!
//! impl ExtractionProgressCallback for WarningLog {
//!     fn on_warning(&self, warning: &ExtractionWarning) {
//!         self.0.lock().unwrap().push(warning.to_string());
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(WarningLog::default()))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Advisory emitted when a page hits a rate limit and is about to retry.
///
/// Purely a progress signal; it is not part of the extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    /// 1-indexed page number.
    pub page: usize,
    /// 1-indexed retry about to be attempted.
    pub retry: u32,
    pub max_retries: u32,
    /// Delay before the retry fires.
    pub wait: Duration,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Provider rate limit hit; page {} will retry in {}s (retry {}/{})",
            self.page,
            self.wait.as_secs_f64(),
            self.retry,
            self.max_retries
        )
    }
}

/// Called by the extraction pipeline as it processes each page.
///
/// Implementations must be `Send + Sync`; every method has a no-op default
/// so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any page is dispatched.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the first model request for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called each time a page backs off after a rate limit.
    fn on_warning(&self, warning: &ExtractionWarning) {
        let _ = warning;
    }

    /// Called when a page's response parsed successfully.
    ///
    /// `rows` counts rows across all four arrays of the page.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, rows: usize) {
        let _ = (page_num, total_pages, rows);
    }

    /// Called when a page fails permanently.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page succeeded and the tables were merged.
    fn on_extraction_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_names_page_and_wait() {
        let w = ExtractionWarning {
            page: 2,
            retry: 1,
            max_retries: 3,
            wait: Duration::from_millis(2000),
        };
        let msg = w.to_string();
        assert!(msg.contains("page 2"), "got: {msg}");
        assert!(msg.contains("2s"), "got: {msg}");
        assert!(msg.contains("1/3"), "got: {msg}");
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: Arc<dyn ExtractionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(2);
        cb.on_page_start(1, 2);
        cb.on_warning(&ExtractionWarning {
            page: 1,
            retry: 1,
            max_retries: 3,
            wait: Duration::ZERO,
        });
        cb.on_page_complete(1, 2, 10);
        cb.on_page_error(2, 2, "boom");
        cb.on_extraction_complete(2);
    }
}
