//! Models command - inspect the OCR model files.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use harvest_core::models::config::HarvestConfig;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check which OCR model files are present
    Status(StatusArgs),

    /// Print the OCR model directory
    Path(StatusArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory (overrides the config file)
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

pub fn run(args: ModelsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    match args.command {
        ModelsCommand::Status(status_args) => {
            override_dir(&mut config, status_args.model_dir);
            check_status(&config)
        }
        ModelsCommand::Path(status_args) => {
            override_dir(&mut config, status_args.model_dir);
            println!("{}", config.models.model_dir.display());
            Ok(())
        }
    }
}

fn override_dir(config: &mut HarvestConfig, dir: Option<PathBuf>) {
    if let Some(dir) = dir {
        config.models.model_dir = dir;
    }
}

fn check_status(config: &HarvestConfig) -> anyhow::Result<()> {
    let models = &config.models;

    println!("{}", style("OCR Model Status").bold());
    println!("Directory: {}", style(models.model_dir.display()).cyan());
    println!();

    let labels = ["Detection", "Recognition", "Dictionary"];
    let mut total_size: u64 = 0;

    for (label, path) in labels.iter().zip(models.required_files()) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if path.exists() {
            let size = fs::metadata(&path)?.len();
            total_size += size;
            println!(
                "  {} {:<12} {} ({})",
                style("✓").green(),
                label,
                name,
                format_size(size)
            );
        } else {
            println!(
                "  {} {:<12} {} {}",
                style("✗").red(),
                label,
                name,
                style("missing").dim()
            );
        }
    }

    println!();
    if models.is_complete() {
        println!(
            "{} All model files present ({})",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "{} OCR will be skipped; pages are read from the PDF text layer only.",
            style("⚠").yellow()
        );
    }
    if !config.ocr.enabled {
        println!("{} OCR is disabled in the configuration.", style("ℹ").blue());
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
