//! PDF text and raster extraction using lopdf and pdf-extract.

use std::cell::OnceCell;
use std::path::Path;

use image::DynamicImage;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use super::raster::{collect_placements, compose, Placement, Transform};
use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// US Letter, used when a page carries no usable MediaBox.
const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    max_render_edge: u32,
    /// Per-page text from pdf-extract, computed on first fallback.
    fallback_pages: OnceCell<Option<Vec<String>>>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            max_render_edge: 4000,
            fallback_pages: OnceCell::new(),
        }
    }

    /// Cap the longest edge of rendered pages.
    pub fn with_max_render_edge(mut self, edge: u32) -> Self {
        self.max_render_edge = edge.max(1);
        self
    }

    /// Read and load a PDF from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;
        let mut extractor = Self::new();
        extractor.load(&data)?;
        Ok(extractor)
    }

    /// Load a PDF from bytes.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        debug!("Loaded PDF with {} pages", doc.get_pages().len());
        self.document = Some(doc);
        self.fallback_pages = OnceCell::new();
        Ok(())
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("no document loaded".to_string()))
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.document()?
            .get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// Page text from pdf-extract, split on form feeds.
    ///
    /// pdf-extract is known to panic on some malformed fonts, so the call is
    /// isolated and a panic counts as "no text".
    fn fallback_page_text(&self, page: u32) -> Option<String> {
        let pages = self.fallback_pages.get_or_init(|| {
            let data = &self.raw_data;
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(data)
            }));
            match outcome {
                Ok(Ok(pages)) => Some(pages),
                Ok(Err(e)) => {
                    warn!("pdf-extract failed: {}", e);
                    None
                }
                Err(_) => {
                    warn!("pdf-extract panicked while reading document");
                    None
                }
            }
        });
        pages
            .as_ref()
            .and_then(|pages| pages.get(page.checked_sub(1)? as usize))
            .cloned()
    }

    /// Look up a page attribute, following the `Parent` chain for inherited keys.
    fn inherited_attribute<'a>(
        &self,
        doc: &'a Document,
        node_id: ObjectId,
        key: &[u8],
    ) -> Option<&'a Object> {
        let mut current = Some(node_id);
        // Page trees are shallow; the bound guards against reference cycles.
        for _ in 0..32 {
            let dict = doc.get_object(current?).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return doc.dereference(value).ok().map(|(_, obj)| obj);
            }
            current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
        }
        None
    }

    /// Page bounds `[x0, y0, x1, y1]` in points, from its MediaBox.
    fn page_box(&self, doc: &Document, page_id: ObjectId) -> [f32; 4] {
        let coords = self
            .inherited_attribute(doc, page_id, b"MediaBox")
            .and_then(|b| b.as_array().ok())
            .filter(|b| b.len() == 4)
            .and_then(|b| {
                let mut out = [0.0; 4];
                for (slot, v) in out.iter_mut().zip(b) {
                    *slot = v.as_float().ok()?;
                }
                Some(out)
            });
        match coords {
            Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => [x0, y0, x1, y1],
            _ => DEFAULT_PAGE_BOX,
        }
    }

    /// Every image the page draws, with its placement.
    fn page_placements(&self, doc: &Document, page_id: ObjectId) -> Vec<Placement> {
        let content = match doc.get_page_content(page_id) {
            Ok(content) => content,
            Err(e) => {
                debug!("Could not read page content: {}", e);
                return Vec::new();
            }
        };
        let resources = self
            .inherited_attribute(doc, page_id, b"Resources")
            .and_then(|r| r.as_dict().ok());

        let mut placements = Vec::new();
        collect_placements(doc, &content, resources, Transform::IDENTITY, 0, &mut placements);
        placements
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let doc = self.document()?;
        self.page_id(page)?;

        match doc.extract_text(&[page]) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                debug!("lopdf text extraction failed on page {}: {}, trying pdf-extract", page, e);
                self.fallback_page_text(page)
                    .map(|text| text.trim().to_string())
                    .ok_or_else(|| PdfError::TextExtraction(format!("page {}: {}", page, e)))
            }
        }
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        let doc = self.document()?;
        let page_id = self.page_id(page)?;

        let placements = self.page_placements(doc, page_id);
        if placements.is_empty() {
            return Err(PdfError::Render(format!("no raster content on page {}", page)));
        }

        let page_box = self.page_box(doc, page_id);
        Ok(compose(&placements, page_box, dpi, self.max_render_edge))
    }
}
