//! Core library for extracting tables from PDF documents with a language
//! model.
//!
//! This crate provides:
//! - PDF processing (per-page text layer and raster access)
//! - OCR fallback for scanned pages using PaddleOCR models
//! - Per-page prompting of an OpenAI-compatible chat model
//! - CSV/TSV reply parsing and cross-page row merging

pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod validation;

pub use error::{HarvestError, Result};
pub use extraction::{
    extract_table, run_extraction, ChatCompletionsClient, ModelInvoker, PageSource,
    PageTextResolver,
};
pub use models::{ExtractionOutcome, ExtractionRequest, HarvestConfig, OutputFormat, Row};
pub use ocr::{OcrBackend, OcrResult, TextBox};
#[cfg(feature = "ocr")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfExtractor, PdfProcessor};
pub use validation::validate_page_range;
