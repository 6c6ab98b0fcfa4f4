//! Table data model: page images in, ragged row-records out.
//!
//! Rows are ordered string-keyed maps rather than structs because the model
//! chooses the column headers, and it is free to choose different ones on
//! different pages. `serde_json` is built with `preserve_order`, so a
//! [`Row`] keeps the column order the model wrote.

use serde::{Deserialize, Serialize};

/// One table row: column header → cell value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One page of the source report as an encoded raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 0-based position in the document.
    pub index: usize,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Base64 payload without any `data:` prefix.
    pub data: String,
}

impl PageImage {
    pub fn new(index: usize, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            index,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// 1-based page number used in messages and errors.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    /// Render as a `data:` URL, the form OpenAI-style endpoints expect.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// What the model transcribed from a single page.
///
/// Each array is optional: a page may hold only part of one statement, or
/// nothing at all.
///
/// Balance-sheet sides are also read from `balanceSheetLeft` /
/// `balanceSheetRight`. When an answer carries both spellings, the
/// underscore key wins and the other is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PageWire")]
pub struct RawPageExtraction {
    /// Balance sheet assets side, top to bottom.
    #[serde(rename = "balanceSheet_left", skip_serializing_if = "Option::is_none")]
    pub balance_sheet_left: Option<Vec<Row>>,

    /// Balance sheet liabilities and equity side, top to bottom.
    #[serde(rename = "balanceSheet_right", skip_serializing_if = "Option::is_none")]
    pub balance_sheet_right: Option<Vec<Row>>,

    #[serde(rename = "incomeStatement", skip_serializing_if = "Option::is_none")]
    pub income_statement: Option<Vec<Row>>,

    #[serde(rename = "cashFlowStatement", skip_serializing_if = "Option::is_none")]
    pub cash_flow_statement: Option<Vec<Row>>,
}

/// Wire form of a page answer, with each balance-sheet spelling in its own slot.
#[derive(Deserialize)]
struct PageWire {
    #[serde(rename = "balanceSheet_left", default)]
    left: Option<Vec<Row>>,
    #[serde(rename = "balanceSheetLeft", default)]
    left_camel: Option<Vec<Row>>,
    #[serde(rename = "balanceSheet_right", default)]
    right: Option<Vec<Row>>,
    #[serde(rename = "balanceSheetRight", default)]
    right_camel: Option<Vec<Row>>,
    #[serde(rename = "incomeStatement", default)]
    income_statement: Option<Vec<Row>>,
    #[serde(rename = "cashFlowStatement", default)]
    cash_flow_statement: Option<Vec<Row>>,
}

impl From<PageWire> for RawPageExtraction {
    fn from(wire: PageWire) -> Self {
        Self {
            balance_sheet_left: wire.left.or(wire.left_camel),
            balance_sheet_right: wire.right.or(wire.right_camel),
            income_statement: wire.income_statement,
            cash_flow_statement: wire.cash_flow_statement,
        }
    }
}

impl RawPageExtraction {
    /// Total rows across all four arrays.
    pub fn row_count(&self) -> usize {
        [
            &self.balance_sheet_left,
            &self.balance_sheet_right,
            &self.income_statement,
            &self.cash_flow_statement,
        ]
        .iter()
        .map(|rows| rows.as_ref().map_or(0, Vec::len))
        .sum()
    }
}

/// The reconciled statements for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialTables {
    /// Assets and liabilities+equity merged side by side.
    #[serde(rename = "balanceSheet")]
    pub balance_sheet: Vec<Row>,
    #[serde(rename = "incomeStatement")]
    pub income_statement: Vec<Row>,
    #[serde(rename = "cashFlowStatement")]
    pub cash_flow_statement: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_url_round_trips_mime() {
        let img = PageImage::new(2, "image/jpeg", "AAAA");
        assert_eq!(img.to_data_url(), "data:image/jpeg;base64,AAAA");
        assert_eq!(img.page_num(), 3);
    }

    #[test]
    fn raw_extraction_accepts_missing_and_null_arrays() {
        let raw: RawPageExtraction = serde_json::from_value(json!({
            "balanceSheet_left": [{"item": "Cash", "v": "10"}],
            "incomeStatement": null
        }))
        .unwrap();
        assert_eq!(raw.balance_sheet_left.as_ref().map(Vec::len), Some(1));
        assert!(raw.balance_sheet_right.is_none());
        assert!(raw.income_statement.is_none());
        assert_eq!(raw.row_count(), 1);
    }

    #[test]
    fn raw_extraction_accepts_camel_case_aliases() {
        let raw: RawPageExtraction = serde_json::from_value(json!({
            "balanceSheetLeft": [{"a": 1}],
            "balanceSheetRight": [{"b": 2}, {"b": 3}]
        }))
        .unwrap();
        assert_eq!(raw.row_count(), 3);
    }

    #[test]
    fn both_spellings_in_one_answer_prefer_underscore_key() {
        let raw: RawPageExtraction = serde_json::from_value(json!({
            "balanceSheet_left": [{"a": "canonical"}],
            "balanceSheetLeft": [{"a": "camel"}, {"a": "camel"}],
            "balanceSheetRight": [{"b": 1}]
        }))
        .unwrap();
        let left = raw.balance_sheet_left.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["a"], "canonical");
        assert_eq!(raw.balance_sheet_right.map(|r| r.len()), Some(1));
    }

    #[test]
    fn serialises_with_underscore_keys() {
        let raw = RawPageExtraction {
            balance_sheet_left: Some(vec![Row::new()]),
            ..Default::default()
        };
        let value = serde_json::to_value(&raw).unwrap();
        assert_eq!(value, json!({"balanceSheet_left": [{}]}));
    }

    #[test]
    fn rows_keep_column_order() {
        let raw: RawPageExtraction = serde_json::from_str(
            r#"{"incomeStatement":[{"z":"1","a":"2","m":"3"}]}"#,
        )
        .unwrap();
        let row = &raw.income_statement.unwrap()[0];
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn financial_tables_serialise_with_exactly_three_keys() {
        let tables = FinancialTables::default();
        let value = serde_json::to_value(&tables).unwrap();
        let obj = value.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["balanceSheet", "incomeStatement", "cashFlowStatement"]);
    }
}
