//! Extraction entry points: fan pages out to the model, fan results in.
//!
//! ## Concurrency model
//!
//! Every page gets its own Tokio task, all started up front; the batch waits
//! on them with a single "join all, fail on first error" point. Results are
//! then ordered by [`PageImage::index`], so neither completion order nor the
//! order of the input `Vec` decides row order.
//!
//! When one page fails permanently the batch returns that page's error at
//! once. The other page tasks are detached, not aborted: their in-flight
//! model calls run to completion and their results are dropped. There is no
//! partial-success result; callers re-run the whole batch.

use crate::config::ExtractionConfig;
use crate::credentials::{CredentialStore, ProviderCredentials};
use crate::error::ExtractError;
use crate::pipeline::{merge, page};
use crate::prompts::{CONNECTION_TEST_PROMPT, CONNECTION_TEST_SYSTEM_PROMPT};
use crate::provider::{resolve_model, ChatModel, UserMessage};
use crate::tables::{FinancialTables, PageImage, RawPageExtraction};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Extract the three financial statements from a sequence of page images.
///
/// This is the primary entry point for the library. Credentials are looked
/// up once and a single model handle is shared by every page.
///
/// # Arguments
/// * `images`   — pages in document order
/// * `provider` — provider identifier (`openai`, `anthropic`, `gemini`, `custom`)
/// * `store`    — where the provider's API key lives
/// * `config`   — extraction configuration
///
/// # Errors
/// - [`ExtractError::CredentialsMissing`] if `store` has no key for `provider`
/// - [`ExtractError::UnsupportedProvider`] for an unknown identifier
/// - [`ExtractError::PageExtraction`] for the first page that fails permanently
///
/// Must be called from within a Tokio runtime.
pub async fn extract_tables(
    images: Vec<PageImage>,
    provider: &str,
    store: &dyn CredentialStore,
    config: &ExtractionConfig,
) -> Result<FinancialTables, ExtractError> {
    let credentials = store
        .get_credentials(provider)
        .ok_or_else(|| ExtractError::CredentialsMissing {
            provider: provider.to_string(),
        })?;
    let model = resolve_model(provider, &credentials, &config.model_options())?;
    extract_with_model(model, images, config).await
}

/// Like [`extract_tables`], but with a caller-built model handle.
///
/// Useful with custom [`ChatModel`] implementations (middleware, caching,
/// test doubles).
pub async fn extract_with_model(
    model: Arc<dyn ChatModel>,
    images: Vec<PageImage>,
    config: &ExtractionConfig,
) -> Result<FinancialTables, ExtractError> {
    let start = Instant::now();
    let total_pages = images.len();
    info!(
        "Extracting {} pages concurrently with {}/{}",
        total_pages,
        model.provider(),
        model.model_name()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total_pages);
    }

    let tasks: Vec<_> = images
        .into_iter()
        .map(|image| {
            let model = Arc::clone(&model);
            let config = config.clone();
            let index = image.index;
            let task =
                tokio::spawn(async move { run_page(model, image, total_pages, config).await });
            (index, task)
        })
        .collect();

    let mut pages = try_join_all(tasks.into_iter().map(|(index, task)| async move {
        match task.await {
            Ok(result) => result.map(|page| (index, page)),
            Err(e) => Err(ExtractError::Internal(format!("page task failed: {e}"))),
        }
    }))
    .await
    .inspect_err(|e| warn!("Extraction failed: {}", e))?;

    // Stable, so pages sharing an index keep their input order.
    pages.sort_by_key(|(index, _)| *index);
    let tables = assemble_tables(pages.into_iter().map(|(_, page)| page).collect());
    info!(
        "All {} pages processed in {:.1}s: balance sheet {} rows, income statement {} rows, cash flow {} rows",
        total_pages,
        start.elapsed().as_secs_f64(),
        tables.balance_sheet.len(),
        tables.income_statement.len(),
        tables.cash_flow_statement.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(total_pages);
    }
    Ok(tables)
}

/// One page task: progress events around [`page::extract_page`].
async fn run_page(
    model: Arc<dyn ChatModel>,
    image: PageImage,
    total_pages: usize,
    config: ExtractionConfig,
) -> Result<RawPageExtraction, ExtractError> {
    let page_num = image.page_num();
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total_pages);
    }
    let result = page::extract_page(model.as_ref(), &image, total_pages, &config).await;
    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(raw) => cb.on_page_complete(page_num, total_pages, raw.row_count()),
            Err(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
        }
    }
    result
}

/// Concatenate page fragments in the given order and merge the balance sheet.
pub fn assemble_tables(pages: Vec<RawPageExtraction>) -> FinancialTables {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut income = Vec::new();
    let mut cash_flow = Vec::new();

    for page in pages {
        left.extend(page.balance_sheet_left.unwrap_or_default());
        right.extend(page.balance_sheet_right.unwrap_or_default());
        income.extend(page.income_statement.unwrap_or_default());
        cash_flow.extend(page.cash_flow_statement.unwrap_or_default());
    }

    FinancialTables {
        balance_sheet: merge::merge_balance_sheet(left, right),
        income_statement: income,
        cash_flow_statement: cash_flow,
    }
}

/// Check that a provider answers with the given credentials.
///
/// Sends one short text-only message; no retry.
///
/// # Errors
/// [`ExtractError::UnsupportedProvider`] or [`ExtractError::ConnectionTest`].
pub async fn test_connection(
    provider: &str,
    credentials: &ProviderCredentials,
    config: &ExtractionConfig,
) -> Result<(), ExtractError> {
    let model = resolve_model(provider, credentials, &config.model_options())?;
    test_model_connection(model.as_ref()).await
}

/// Probe an already-built model handle.
pub async fn test_model_connection(model: &dyn ChatModel) -> Result<(), ExtractError> {
    let messages = [UserMessage::text(CONNECTION_TEST_PROMPT)];
    match model.invoke(CONNECTION_TEST_SYSTEM_PROMPT, &messages).await {
        Ok(_) => {
            info!("Test connection successful for {}", model.provider());
            Ok(())
        }
        Err(e) => {
            warn!("Test connection failed for {}: {}", model.provider(), e);
            Err(ExtractError::ConnectionTest {
                provider: model.provider().to_string(),
                detail: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Row;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Option<Vec<Row>> {
        Some(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn assemble_concatenates_in_page_order() {
        let p1 = RawPageExtraction {
            income_statement: rows(json!([{"i": 1}, {"i": 2}])),
            cash_flow_statement: rows(json!([{"c": 1}])),
            ..Default::default()
        };
        let p2 = RawPageExtraction {
            income_statement: rows(json!([{"i": 3}])),
            ..Default::default()
        };

        let tables = assemble_tables(vec![p1, p2]);

        let income: Vec<i64> = tables
            .income_statement
            .iter()
            .map(|r| r["i"].as_i64().unwrap())
            .collect();
        assert_eq!(income, vec![1, 2, 3]);
        assert_eq!(tables.cash_flow_statement.len(), 1);
        assert!(tables.balance_sheet.is_empty());
    }

    #[test]
    fn assemble_merges_sides_across_pages() {
        // Assets on page 1, liabilities continue over pages 1 and 2.
        let p1 = RawPageExtraction {
            balance_sheet_left: rows(json!([{"a": "Cash"}, {"a": "Total"}])),
            balance_sheet_right: rows(json!([{"b": "Loan"}])),
            ..Default::default()
        };
        let p2 = RawPageExtraction {
            balance_sheet_right: rows(json!([{"b": "Equity"}, {"b": "Total"}])),
            ..Default::default()
        };

        let tables = assemble_tables(vec![p1, p2]);

        let bs = &tables.balance_sheet;
        assert_eq!(bs.len(), 3);
        assert_eq!(bs[0]["b"], "Loan");
        assert_eq!(bs[1]["a"], "");
        assert_eq!(bs[2]["a"], "Total");
        assert_eq!(bs[2]["b"], "Total");
    }

    #[test]
    fn assemble_of_nothing_is_empty() {
        assert_eq!(assemble_tables(vec![]), FinancialTables::default());
    }
}
