//! Row serialization back to delimited text.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::ExtractionError;
use crate::models::table::{OutputFormat, Row};

/// Write rows as CSV/TSV with minimal quoting, one `\n` per row and no
/// trailing newline.
pub fn serialize_rows(rows: &[Row], format: OutputFormat) -> crate::Result<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(format.delimiter())
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::<u8>::new());

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| ExtractionError::Serialize(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExtractionError::Serialize(e.error().to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| ExtractionError::Serialize(e.to_string()))?;

    Ok(text.trim_end_matches('\n').to_string())
}
