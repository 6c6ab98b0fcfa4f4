//! # finstat-extract
//!
//! Extract financial statements from scanned report pages using Vision
//! Language Models (VLMs).
//!
//! Each page image is sent to a vision model with a fixed instruction to
//! transcribe any balance sheet, income statement or cash-flow statement it
//! sees as JSON rows. Pages are processed concurrently, and the per-page
//! fragments are reconciled into three tables. The two sides of the balance
//! sheet (assets vs. liabilities and equity) are read independently and
//! stitched side by side so their total rows line up.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images
//!  │
//!  ├─ 1. Input     resolve files / URLs / data URLs to base64 images
//!  ├─ 2. Provider  one shared model handle (openai, anthropic, gemini, custom)
//!  ├─ 3. Extract   one concurrent model call per page, 429 → linear backoff
//!  ├─ 4. Parse     isolate the JSON object in each answer
//!  └─ 5. Merge     concatenate pages, align balance-sheet sides on totals
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use finstat_extract::{
//!     extract_tables, load_page_images, EnvCredentialStore, ExtractionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let pages = load_page_images(&["p1.jpg", "p2.jpg"], config.download_timeout_secs).await?;
//!     // Reads OPENAI_API_KEY (and optional OPENAI_BASE_URL / OPENAI_MODEL).
//!     let tables = extract_tables(pages, "openai", &EnvCredentialStore, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&tables)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `finstat` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod tables;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use credentials::{
    CredentialStore, EnvCredentialStore, FileCredentialStore, MemoryCredentialStore,
    ProviderCredentials,
};
pub use error::{ExtractError, ModelError, PageError, ParseError};
pub use extract::{extract_tables, extract_with_model, test_connection};
pub use pipeline::input::load_page_images;
pub use pipeline::merge::merge_balance_sheet;
pub use pipeline::page::extract_page;
pub use pipeline::parse::parse_response;
pub use progress::{
    ExtractionProgressCallback, ExtractionWarning, NoopProgressCallback, ProgressCallback,
};
pub use provider::{resolve_model, ChatModel, ModelOptions, ProviderKind, UserMessage};
pub use tables::{FinancialTables, PageImage, RawPageExtraction, Row};
