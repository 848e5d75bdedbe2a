//! Request and result types for a table extraction run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extraction::serializer::serialize_rows;

/// First-column name that identifies a header row.
pub const PAGE_NUMBER_COLUMN: &str = "page_number";

/// One row of cells.
pub type Row = Vec<String>;

/// Delimited output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    /// Comma-separated values.
    #[default]
    Csv,
    /// Tab-separated values.
    Tsv,
}

impl OutputFormat {
    /// Field delimiter byte.
    pub fn delimiter(self) -> u8 {
        match self {
            OutputFormat::Csv => b',',
            OutputFormat::Tsv => b'\t',
        }
    }

    /// Token used in prompts ("CSV" / "TSV").
    pub fn token(self) -> &'static str {
        match self {
            OutputFormat::Csv => "CSV",
            OutputFormat::Tsv => "TSV",
        }
    }

    /// File extension.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }

    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv",
            OutputFormat::Tsv => "text/tab-separated-values",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSV" => Ok(OutputFormat::Csv),
            "TSV" => Ok(OutputFormat::Tsv),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Whether a row is a header, i.e. its first cell is `page_number`.
pub fn is_header_row(row: &[String]) -> bool {
    row.first()
        .map(|cell| cell.trim().eq_ignore_ascii_case(PAGE_NUMBER_COLUMN))
        .unwrap_or(false)
}

/// Parameters of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Free-text description of what to extract.
    pub prompt: String,
    /// Output format requested from the model.
    pub format: OutputFormat,
    /// Zero-based index of the first page to process.
    pub offset: usize,
    /// Maximum number of pages to process (None = all after offset).
    pub limit: Option<usize>,
}

impl ExtractionRequest {
    /// Create a request over the whole document in CSV.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: OutputFormat::Csv,
            offset: 0,
            limit: None,
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the zero-based start page.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set the page limit.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Number of pages in scope for a document with `total_pages` pages.
    ///
    /// The limit is clamped to the pages remaining after the offset; an
    /// offset at or past the end gives zero.
    pub fn effective_pages(&self, total_pages: usize) -> usize {
        let remaining = total_pages.saturating_sub(self.offset);
        match self.limit {
            Some(limit) => remaining.min(limit),
            None => remaining,
        }
    }
}

/// Merged table plus page counters, returned by a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Header (if any) followed by data rows.
    pub rows: Vec<Row>,
    /// Pages that produced at least one data row.
    pub extracted_pages: usize,
    /// Pages considered in range.
    pub total_pages: usize,
}

impl ExtractionOutcome {
    /// Outcome of a run with nothing in range.
    pub fn empty(total_pages: usize) -> Self {
        Self {
            rows: Vec::new(),
            extracted_pages: 0,
            total_pages,
        }
    }

    /// The header row, if the model supplied one.
    pub fn header(&self) -> Option<&Row> {
        self.rows.first().filter(|row| is_header_row(row))
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Row] {
        match self.header() {
            Some(_) => &self.rows[1..],
            None => &self.rows,
        }
    }

    /// Whether the run produced no rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the rows as delimited text.
    pub fn serialize(&self, format: OutputFormat) -> crate::Result<String> {
        serialize_rows(&self.rows, format)
    }
}
