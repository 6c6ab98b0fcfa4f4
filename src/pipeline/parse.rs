//! Response parsing: isolate and validate the JSON object in model output.
//!
//! The prompt asks for raw JSON, but models still wrap answers in
//! ```` ```json ```` fences or add a sentence of prose. Two tiers handle both:
//!
//! 1. Take the span from the first `{` to the last `}` verbatim. This
//!    ignores any fences or prose around the object.
//! 2. If the text has no such span, strip a leading fence marker (with or
//!    without a language tag) and a trailing one, then parse what is left.
//!
//! Parse failures are final for the page; they are not retried.

use crate::error::ParseError;
use crate::tables::RawPageExtraction;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```$").unwrap());

/// Parse one page's model output into a [`RawPageExtraction`].
///
/// # Errors
/// [`ParseError::NoJsonObject`] when nothing JSON-like is present,
/// [`ParseError::InvalidJson`] when the isolated span does not parse, and
/// [`ParseError::UnexpectedShape`] when the JSON is not an object of row arrays.
pub fn parse_response(raw: &str) -> Result<RawPageExtraction, ParseError> {
    let value = isolate_json(raw)?;
    if !value.is_object() {
        return Err(ParseError::UnexpectedShape(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| ParseError::UnexpectedShape(e.to_string()))
}

/// Isolate and parse the JSON payload in free-form model text.
pub fn isolate_json(raw: &str) -> Result<Value, ParseError> {
    let text = raw.trim();

    if let Some(span) = object_span(text) {
        return serde_json::from_str(span).map_err(|e| ParseError::InvalidJson(e.to_string()));
    }

    let stripped = strip_fences(text);
    if stripped.is_empty() {
        return Err(ParseError::NoJsonObject);
    }
    serde_json::from_str(stripped).map_err(|_| ParseError::NoJsonObject)
}

/// First `{` through last `}`, inclusive.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn strip_fences(text: &str) -> &str {
    let mut s = text;
    if let Some(m) = RE_LEADING_FENCE.find(s) {
        s = &s[m.end()..];
    }
    if let Some(m) = RE_TRAILING_FENCE.find(s) {
        s = &s[..m.start()];
    }
    s.trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_and_bare_json_are_equivalent() {
        let fenced = isolate_json("```json\n{\"a\":1}\n```").unwrap();
        let bare = isolate_json("{\"a\":1}").unwrap();
        assert_eq!(fenced, bare);
        assert_eq!(bare, json!({"a": 1}));

        assert_eq!(
            parse_response("```json\n{\"a\":1}\n```").unwrap(),
            parse_response("{\"a\":1}").unwrap()
        );
    }

    #[test]
    fn prose_around_object_is_ignored() {
        let raw = "Here is the data you asked for:\n{\"incomeStatement\":[{\"Item\":\"Revenue\",\"2023\":\"100\"}]}\nLet me know!";
        let parsed = parse_response(raw).unwrap();
        let rows = parsed.income_statement.unwrap();
        assert_eq!(rows[0]["Item"], "Revenue");
    }

    #[test]
    fn fence_without_language_tag() {
        let raw = "```\n{\"cashFlowStatement\":[]}\n```";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.cash_flow_statement, Some(vec![]));
    }

    #[test]
    fn full_page_extraction_parses_all_arrays() {
        let raw = r#"{
            "balanceSheet_left": [{"item":"Cash","v":"10"},{"item":"Total","v":"10"}],
            "balanceSheet_right": [{"item":"Equity","v":"10"}],
            "incomeStatement": [],
            "cashFlowStatement": [{"item":"Net","v":3}]
        }"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.balance_sheet_left.as_ref().unwrap().len(), 2);
        assert_eq!(parsed.balance_sheet_right.as_ref().unwrap().len(), 1);
        assert_eq!(parsed.cash_flow_statement.as_ref().unwrap()[0]["v"], 3);
    }

    #[test]
    fn no_object_is_rejected() {
        assert_eq!(
            parse_response("I could not find any tables."),
            Err(ParseError::NoJsonObject)
        );
        assert_eq!(parse_response(""), Err(ParseError::NoJsonObject));
        assert_eq!(parse_response("```json\n```"), Err(ParseError::NoJsonObject));
    }

    #[test]
    fn truncated_object_is_invalid_json() {
        let err = parse_response("{\"incomeStatement\": [{\"a\": 1}, {\"b\": }").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)), "got {err:?}");
    }

    #[test]
    fn bare_array_is_unexpected_shape() {
        let err = parse_response("```json\n[1, 2]\n```").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedShape(_)), "got {err:?}");
    }

    #[test]
    fn non_object_rows_are_unexpected_shape() {
        let err = parse_response("{\"incomeStatement\": [\"Revenue\", 100]}").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedShape(_)), "got {err:?}");
    }

    #[test]
    fn answer_with_both_side_spellings_parses() {
        let raw = parse_response(
            r#"{"balanceSheet_right": [{"b": 1}], "balanceSheetRight": [{"b": 2}]}"#,
        )
        .unwrap();
        assert_eq!(raw.balance_sheet_right.unwrap()[0]["b"], 1);
    }
}
