//! Subcommands and the configuration plumbing they share.

pub mod config;
pub mod extract;
pub mod models;
pub mod pages;

use std::path::{Path, PathBuf};

use harvest_core::models::config::{HarvestConfig, LlmConfig};
use tracing::debug;

/// Environment variables read into [`LlmConfig`].
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_MODEL: &str = "OPENROUTER_MODEL";
pub const ENV_REFERER: &str = "OPENROUTER_REFERER";
pub const ENV_TITLE: &str = "OPENROUTER_TITLE";

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdfharvest")
        .join("config.json")
}

/// The config file in effect: `-c` if given, else the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit path must exist; the default location
/// may be absent, in which case defaults are used.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<HarvestConfig> {
    let path = config_path(explicit);
    if explicit.is_some() || path.exists() {
        debug!("Loading config from {}", path.display());
        let config = HarvestConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        return Ok(config);
    }
    Ok(HarvestConfig::default())
}

/// Overlay model-service settings from the process environment.
pub fn apply_env(llm: &mut LlmConfig) {
    apply_env_with(llm, |name| std::env::var(name).ok());
}

fn apply_env_with(llm: &mut LlmConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(key) = get(ENV_API_KEY) {
        llm.api_key = Some(key);
    }
    if let Some(model) = get(ENV_MODEL) {
        llm.model = model;
    }
    if let Some(referer) = get(ENV_REFERER) {
        llm.referer = Some(referer);
    }
    if let Some(title) = get(ENV_TITLE) {
        llm.title = Some(title);
    }
}
