//! Per-page text resolution: native text layer vs. OCR.

use std::path::Path;

use image::DynamicImage;
use tempfile::TempDir;
use tracing::{debug, trace, warn};

use crate::models::config::{HarvestConfig, PdfConfig};
use crate::ocr::{best_text, OcrBackend};
use crate::pdf::{PdfExtractor, PdfProcessor};

/// Pages that can be turned into text one at a time.
pub trait PageSource {
    /// Total pages in the document.
    fn page_count(&self) -> usize;

    /// Best-effort text for a zero-based page index. Never fails; an
    /// unreadable page is empty text.
    fn resolve(&self, page_index: usize) -> String;
}

/// Which source a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Native,
    Ocr,
    Empty,
}

/// Native-vs-OCR precedence rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    /// Native text longer than this is substantial.
    pub substantial_chars: usize,
    /// OCR must be this many times longer to beat substantial native text.
    pub ocr_preference_ratio: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&PdfConfig::default())
    }
}

impl SelectionPolicy {
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            substantial_chars: config.substantial_text_chars,
            ocr_preference_ratio: config.ocr_preference_ratio,
        }
    }

    /// Pick between native and OCR text for one page.
    pub fn select<'a>(&self, native: &'a str, ocr: &'a str) -> (TextSource, &'a str) {
        let native = native.trim();
        let ocr = ocr.trim();
        let native_len = native.chars().count();

        if native_len > self.substantial_chars {
            let ocr_len = ocr.chars().count() as f64;
            if ocr_len > native_len as f64 * self.ocr_preference_ratio {
                return (TextSource::Ocr, ocr);
            }
            return (TextSource::Native, native);
        }
        if !ocr.is_empty() {
            return (TextSource::Ocr, ocr);
        }
        if !native.is_empty() {
            return (TextSource::Native, native);
        }
        (TextSource::Empty, "")
    }
}

/// Resolves page text from a PDF, running OCR alongside the text layer.
///
/// Owns a scratch directory for rendered page images; it is removed when
/// the resolver is dropped.
pub struct PageTextResolver<P: PdfProcessor = PdfExtractor> {
    pdf: P,
    ocr: Option<Box<dyn OcrBackend>>,
    policy: SelectionPolicy,
    render_dpi: u32,
    ocr_sufficient_chars: usize,
    scratch: TempDir,
}

impl PageTextResolver<PdfExtractor> {
    /// Open a PDF and attach the OCR engine configured in `config`.
    ///
    /// Failing to read the document is fatal. A missing or broken OCR
    /// engine only disables OCR.
    pub fn open(path: &Path, config: &HarvestConfig) -> crate::Result<Self> {
        let pdf = PdfExtractor::open(path)?.with_max_render_edge(config.pdf.max_render_edge);
        let mut resolver = Self::new(pdf, config)?;

        if config.ocr.enabled {
            resolver.ocr = load_ocr_engine(config);
        }
        Ok(resolver)
    }
}

#[cfg(feature = "ocr")]
fn load_ocr_engine(config: &HarvestConfig) -> Option<Box<dyn OcrBackend>> {
    match crate::ocr::PureOcrEngine::from_config(&config.models, &config.ocr) {
        Ok(engine) => Some(Box::new(engine)),
        Err(e) => {
            warn!("OCR disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn load_ocr_engine(_config: &HarvestConfig) -> Option<Box<dyn OcrBackend>> {
    warn!("OCR disabled: built without the `ocr` feature");
    None
}

impl<P: PdfProcessor> PageTextResolver<P> {
    /// Create a native-only resolver over an already loaded document.
    pub fn new(pdf: P, config: &HarvestConfig) -> crate::Result<Self> {
        let scratch = tempfile::Builder::new().prefix("pdfharvest-").tempdir()?;
        trace!("Page scratch directory: {}", scratch.path().display());

        Ok(Self {
            pdf,
            ocr: None,
            policy: SelectionPolicy::from_config(&config.pdf),
            render_dpi: config.pdf.render_dpi,
            ocr_sufficient_chars: config.ocr.sufficient_chars,
            scratch,
        })
    }

    /// Attach an OCR backend.
    pub fn with_ocr(mut self, backend: Box<dyn OcrBackend>) -> Self {
        self.ocr = Some(backend);
        self
    }

    /// Whether OCR runs for each page.
    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Directory holding rendered page images for this run.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn native_text(&self, page: u32) -> String {
        match self.pdf.extract_page_text(page) {
            Ok(text) => text,
            Err(e) => {
                warn!("Native text extraction failed on page {}: {}", page, e);
                String::new()
            }
        }
    }

    fn ocr_text(&self, page: u32) -> String {
        let Some(backend) = self.ocr.as_deref() else {
            return String::new();
        };

        let image = match self.pdf.render_page(page, self.render_dpi) {
            Ok(image) => image,
            Err(e) => {
                debug!("No OCR input for page {}: {}", page, e);
                return String::new();
            }
        };
        self.keep_render(page, &image);

        best_text(backend, &image, self.ocr_sufficient_chars)
    }

    fn keep_render(&self, page: u32, image: &DynamicImage) {
        let path = self.scratch.path().join(format!("page-{:04}.png", page));
        match image.save_with_format(&path, image::ImageFormat::Png) {
            Ok(()) => trace!("Rendered page {} to {}", page, path.display()),
            Err(e) => debug!("Could not write render for page {}: {}", page, e),
        }
    }
}

impl<P: PdfProcessor> PageSource for PageTextResolver<P> {
    fn page_count(&self) -> usize {
        self.pdf.page_count() as usize
    }

    fn resolve(&self, page_index: usize) -> String {
        let page = page_index as u32 + 1;
        let native = self.native_text(page);
        let ocr = self.ocr_text(page);

        let (source, text) = self.policy.select(&native, &ocr);
        debug!(
            page,
            native_chars = native.chars().count(),
            ocr_chars = ocr.chars().count(),
            source = ?source,
            "Resolved page text"
        );
        text.to_string()
    }
}
