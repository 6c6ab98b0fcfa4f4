//! Pipeline stages for financial statement extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the coordinator in [`crate::extract`] only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ page (× N, concurrent) ──▶ parse ──▶ merge
//! (files/URLs) (VLM + retry)         (JSON)    (balance sheet)
//! ```
//!
//! 1. [`input`] — resolve file paths, URLs and data URLs to base64 images
//! 2. [`page`]  — one model call per page with rate-limit retry; the only
//!    stage with network I/O
//! 3. [`parse`] — isolate the JSON object in the model's free-form answer
//! 4. [`merge`] — align the two balance-sheet sides on their total rows

pub mod input;
pub mod merge;
pub mod page;
pub mod parse;
