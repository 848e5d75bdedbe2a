//! Model reply cleanup and delimited-text parsing.

use csv::ReaderBuilder;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::table::Row;

lazy_static! {
    /// Optional markdown fence around CSV/TSV output.
    static ref CODE_FENCE: Regex = Regex::new(r"(?i)```(?:csv|tsv)?\s*([\s\S]*?)\s*```").unwrap();
}

/// Remove a markdown code fence wrapper, returning the trimmed inner content.
///
/// Without a fence the whole text is trimmed.
pub fn strip_fences(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// Parse delimited text into rows of trimmed cells.
///
/// Fences are stripped first. Rows whose cells are all blank are dropped,
/// rows may have differing lengths, and records the tokenizer rejects are
/// skipped.
pub fn parse_rows(text: &str, delimiter: u8) -> Vec<Row> {
    let cleaned = strip_fences(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(cleaned.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unreadable record: {}", e);
                continue;
            }
        };
        let row: Row = record.iter().map(|cell| cell.trim().to_string()).collect();
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    rows
}
