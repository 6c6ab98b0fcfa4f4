//! Balance-sheet merge: stitch the assets side and the liabilities+equity
//! side into one wide table.
//!
//! The model reads each side of a balance sheet independently, so the two
//! sides rarely have the same number of rows. The last row of each side is
//! taken to be its "total" row. The shorter side is padded with blank rows
//! just before its total until both sides are the same length, so the two
//! totals land on the same output row. Rows are then zipped left to right.
//!
//! ```text
//!  left            right                 merged
//!  Cash      10    Payables   4          Cash  10 │ Payables  4
//!  Total     10    Equity     6    ──▶         ·  │ Equity    6
//!                  Total     10          Total 10 │ Total    10
//! ```
//!
//! Alignment is positional only. No attempt is made to match row labels;
//! multi-level subtotals will not line up.

use crate::tables::Row;
use serde_json::Value;

/// Suffix appended to right-side columns whose name already exists on the left.
pub const RIGHT_SUFFIX: &str = "_R";

/// Merge the two balance-sheet sides into one sequence of wide rows.
///
/// If either side is empty the other is returned unchanged. Otherwise the
/// output has `max(left.len(), right.len())` rows and its last row combines
/// both sides' last rows.
pub fn merge_balance_sheet(left: Vec<Row>, right: Vec<Row>) -> Vec<Row> {
    if left.is_empty() {
        return right;
    }
    if right.is_empty() {
        return left;
    }

    let len = left.len().max(right.len());
    let left = pad_before_total(left, len);
    let right = pad_before_total(right, len);

    left.into_iter()
        .zip(right)
        .map(|(l, r)| combine_rows(l, r))
        .collect()
}

/// Insert blank rows before the last row until `rows.len() == len`.
///
/// A blank row carries every column of the side's first row with an empty
/// string value. `rows` must be non-empty.
fn pad_before_total(mut rows: Vec<Row>, len: usize) -> Vec<Row> {
    let missing = len.saturating_sub(rows.len());
    if missing == 0 {
        return rows;
    }
    let blank: Row = rows[0]
        .keys()
        .map(|k| (k.clone(), Value::String(String::new())))
        .collect();
    let at = rows.len() - 1;
    rows.splice(at..at, std::iter::repeat_n(blank, missing));
    rows
}

/// Left fields first, then right fields; clashing right keys get [`RIGHT_SUFFIX`].
fn combine_rows(left: Row, right: Row) -> Row {
    let mut row = left;
    for (key, value) in right {
        let mut name = key;
        while row.contains_key(&name) {
            name.push_str(RIGHT_SUFFIX);
        }
        row.insert(name, value);
    }
    row
}
