//! PDF processing module.

mod extractor;
mod raster;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Per-page access to a loaded PDF.
pub trait PdfProcessor {
    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract embedded (vector) text from a page (1-indexed).
    fn extract_page_text(&self, page: u32) -> Result<String>;

    /// Render a page (1-indexed) as an image at the specified DPI.
    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage>;
}
