//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default OpenAI-compatible endpoint (OpenRouter).
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Default value for the `X-Title` request header.
pub const DEFAULT_TITLE: &str = "pdfharvest";

/// Main configuration for the pdfharvest pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Model service configuration.
    pub llm: LlmConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// OCR model file locations.
    pub models: ModelConfig,
}

/// Model service configuration.
///
/// Credentials are never read from the environment here; the caller fills
/// them in before handing the config to the invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat completions API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Optional `HTTP-Referer` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Optional `X-Title` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            referer: None,
            title: Some(DEFAULT_TITLE.to_string()),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// PDF processing and text-source selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// Longest edge allowed for a rendered page, in pixels.
    pub max_render_edge: u32,

    /// Native text longer than this many characters counts as substantial.
    pub substantial_text_chars: usize,

    /// OCR replaces substantial native text when it is this many times longer.
    pub ocr_preference_ratio: f64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300,
            max_render_edge: 4000,
            substantial_text_chars: 50,
            ocr_preference_ratio: 1.5,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Run OCR at all.
    pub enabled: bool,

    /// Stop trying recognition variants once output exceeds this length.
    pub sufficient_chars: usize,

    /// Keep `[UNK]` tokens in recognized text.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sufficient_chars: 100,
            keep_unk: false,
        }
    }
}

/// Model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl ModelConfig {
    /// Paths of every file the OCR engine needs, in load order.
    pub fn required_files(&self) -> [PathBuf; 3] {
        [
            self.model_dir.join(&self.detection_model),
            self.model_dir.join(&self.recognition_model),
            self.model_dir.join(&self.dictionary),
        ]
    }

    /// Whether all model files are present.
    pub fn is_complete(&self) -> bool {
        self.required_files().iter().all(|p| p.exists())
    }
}

impl HarvestConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
