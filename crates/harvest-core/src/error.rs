//! Error types for the harvest-core library.

use thiserror::Error;

/// Main error type for the harvest library.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Table extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Page range or request validation error.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to read PDF: {0}")]
    Parse(String),

    /// Failed to extract text from a page.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to produce a raster for a page.
    #[error("failed to render page: {0}")]
    Render(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection or recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors raised by the model service client.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Transport failure talking to the service.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Client could not be built from the given configuration.
    #[error("invalid model configuration: {0}")]
    Config(String),
}

/// Errors that abort an extraction run.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The model call for a page failed; the whole run is abandoned.
    #[error("LLM invocation failed: {source}")]
    ModelInvocation {
        page: u32,
        #[source]
        source: ModelError,
    },

    /// Rows could not be written out.
    #[error("failed to serialize rows: {0}")]
    Serialize(String),
}

/// Errors for user-supplied page ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("PDF has no pages.")]
    NoPages,

    #[error("Limit pages must be a positive integer.")]
    InvalidLimit,

    #[error("Page offset is beyond the total number of pages.")]
    OffsetOutOfRange,
}

/// Result type for the harvest library.
pub type Result<T> = std::result::Result<T, HarvestError>;
