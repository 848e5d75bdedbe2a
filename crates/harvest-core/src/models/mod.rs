//! Data models: configuration and extraction request/result types.

pub mod config;
pub mod table;

pub use config::{HarvestConfig, LlmConfig, ModelConfig, OcrConfig, PdfConfig};
pub use table::{ExtractionOutcome, ExtractionRequest, OutputFormat, Row, PAGE_NUMBER_COLUMN};
