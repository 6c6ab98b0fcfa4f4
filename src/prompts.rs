//! Prompts for VLM-based financial statement extraction.
//!
//! Every prompt lives here so the extraction contract with the model can be
//! inspected (and unit-tested) without spinning up a real provider.
//! Callers can override the system instruction via
//! [`crate::config::ExtractionConfig::system_prompt`].

use crate::provider::UserMessage;
use crate::tables::PageImage;

/// Fixed system instruction for page extraction.
///
/// The model is asked for the two balance-sheet sides independently; lining
/// them up is done afterwards by [`crate::pipeline::merge`].
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert financial data extraction AI. Extract data from the provided financial report images into JSON.

The JSON must contain these four top-level arrays:
- "balanceSheet_left": The LEFT side of the Balance Sheet (Assets). Read top-to-bottom.
- "balanceSheet_right": The RIGHT side of the Balance Sheet (Liabilities & Equity). Read top-to-bottom.
- "incomeStatement": The Income Statement. Read top-to-bottom.
- "cashFlowStatement": The Cash Flow Statement. Read top-to-bottom.

Rules:
1. Each array item is one row. Keys = column headers, values = cell content (string or number).
2. For the Balance Sheet: extract left side and right side as TWO SEPARATE arrays. Do NOT try to align them horizontally. Just read each side independently from top to bottom.
3. For Income Statement and Cash Flow Statement: extract as a single simple table from top to bottom.
4. Transcribe exactly what you see. Do not omit or summarize.
5. If a table spans multiple pages, continue appending rows.
6. Do not wrap in markdown code blocks. Output raw JSON only."#;

/// Text that accompanies each page image in the user turn.
pub const PAGE_INSTRUCTION: &str = "Please carefully review this financial report page and extract any Balance Sheet, Income statement, or Cash Flow Statement tables present:";

/// Text-only probe used by [`crate::extract::test_connection`].
pub const CONNECTION_TEST_PROMPT: &str = "Hello, please reply 'OK' to test connection.";

/// System instruction accompanying the connection probe.
pub const CONNECTION_TEST_SYSTEM_PROMPT: &str = "You are a connectivity check. Answer in one word.";

/// Build the single user turn for one page: instruction text plus the image.
pub fn page_message(image: &PageImage) -> UserMessage {
    UserMessage::with_image(PAGE_INSTRUCTION, image.clone())
}
