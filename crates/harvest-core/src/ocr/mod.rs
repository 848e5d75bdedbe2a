//! OCR for pages without a usable text layer.

mod preprocessing;
#[cfg(feature = "ocr")]
mod pure_engine;

pub use preprocessing::OcrVariant;
#[cfg(feature = "ocr")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::OcrError;

/// A recognized text box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of OCR processing on an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Full text (boxes joined with newlines).
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Build a result from boxes, ordering them top-to-bottom, left-to-right.
    pub fn from_boxes(mut boxes: Vec<TextBox>, processing_time_ms: u64) -> Self {
        boxes.sort_by(|a, b| {
            let (ax, ay, _, _) = a.rect();
            let (bx, by, _, _) = b.rect();

            // Group by approximate vertical position (within 20 pixels)
            let row_a = (ay / 20.0) as i32;
            let row_b = (by / 20.0) as i32;

            row_a
                .cmp(&row_b)
                .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = boxes
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            boxes,
            text,
            processing_time_ms,
        }
    }
}

/// A text recognizer that can be pointed at a page image.
pub trait OcrBackend {
    /// Recognize all text in the image.
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;
}

/// Recognize a page under each [`OcrVariant`], keeping the longest text.
///
/// Stops early once a variant yields more than `sufficient_chars`
/// characters. Failing variants are skipped; if all fail the result is
/// empty.
pub fn best_text(backend: &dyn OcrBackend, image: &DynamicImage, sufficient_chars: usize) -> String {
    let mut best = String::new();

    for variant in OcrVariant::ALL {
        let prepared = variant.apply(image);
        let text = match backend.recognize(&prepared) {
            Ok(result) => result.text.trim().to_string(),
            Err(e) => {
                warn!("OCR variant {:?} failed: {}", variant, e);
                continue;
            }
        };

        let chars = text.chars().count();
        debug!("OCR variant {:?} produced {} chars", variant, chars);

        if chars > sufficient_chars {
            return text;
        }
        if chars > best.chars().count() {
            best = text;
        }
    }

    best
}
