//! Extract command - pull a table out of a PDF with a language model.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use harvest_core::extraction::{extract_table, ChatCompletionsClient, PageSource, PageTextResolver};
use harvest_core::models::{ExtractionOutcome, ExtractionRequest, HarvestConfig, OutputFormat};
use harvest_core::validate_page_range;

use super::{apply_env, load_config, ENV_API_KEY};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// What to extract, in plain language
    #[arg(short, long)]
    prompt: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Zero-based index of the first page to process
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum number of pages to process
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model identifier (overrides OPENROUTER_MODEL and the config file)
    #[arg(short, long)]
    model: Option<String>,

    /// API key (overrides OPENROUTER_API_KEY and the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Print a JSON report with the table and page counts
    #[arg(long)]
    report: bool,

    /// Use only the PDF text layer
    #[arg(long)]
    no_ocr: bool,

    /// OCR model directory
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Tsv => OutputFormat::Tsv,
        }
    }
}

/// Machine-readable summary printed with `--report`.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    data: &'a str,
    format: OutputFormat,
    mime_type: &'static str,
    rows: usize,
    data_rows: usize,
    extracted_pages: usize,
    total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
}

impl<'a> RunReport<'a> {
    fn new(
        outcome: &ExtractionOutcome,
        table: &'a str,
        format: OutputFormat,
        output: Option<&'a Path>,
    ) -> Self {
        Self {
            data: table,
            format,
            mime_type: format.mime_type(),
            rows: outcome.rows.len(),
            data_rows: outcome.data_rows().len(),
            extracted_pages: outcome.extracted_pages,
            total_pages: outcome.total_pages,
            output,
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if args.prompt.trim().is_empty() {
        anyhow::bail!("Prompt must not be empty.");
    }

    let client = ChatCompletionsClient::new(&config.llm).map_err(|e| {
        anyhow::anyhow!("{}. Set {} or pass --api-key.", e, ENV_API_KEY)
    })?;

    info!("Processing file: {}", args.input.display());
    let resolver = PageTextResolver::open(&args.input, &config)?;
    let (offset, limit) = validate_page_range(args.offset, args.limit, resolver.page_count())?;

    let format = OutputFormat::from(args.format);
    let request = ExtractionRequest::new(args.prompt.trim())
        .with_format(format)
        .with_offset(offset)
        .with_limit(limit);

    let pb = progress_bar(request.effective_pages(resolver.page_count()) as u64)?;
    let mut on_progress = |fraction: f64, message: &str| {
        let length = pb.length().unwrap_or(0) as f64;
        pb.set_position((fraction * length).round() as u64);
        pb.set_message(message.to_string());
    };

    let result = extract_table(&resolver, &client, &request, Some(&mut on_progress)).await;
    pb.finish_and_clear();
    drop(resolver);

    let outcome = result?;
    if outcome.is_empty() {
        anyhow::bail!("No text could be extracted from the PDF.");
    }

    let table = outcome.serialize(format)?;
    let written = match &args.output {
        Some(path) => {
            let path = with_format_extension(path, format);
            fs::write(&path, &table)?;
            Some(path)
        }
        None => None,
    };

    if args.report {
        print_report(&outcome, &table, format, written.as_deref())?;
    } else if written.is_none() {
        println!("{}", table);
    }

    if let Some(path) = &written {
        eprintln!("{} Output written to {}", style("✓").green(), path.display());
    }
    eprintln!(
        "{} Pages scanned: {} of {}",
        style("ℹ").blue(),
        outcome.extracted_pages,
        outcome.total_pages
    );

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

/// Command-line flags win over everything loaded so far.
fn apply_overrides(config: &mut HarvestConfig, args: &ExtractArgs) {
    apply_env(&mut config.llm);

    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(key) = &args.api_key {
        config.llm.api_key = Some(key.clone());
    }
    if args.no_ocr {
        config.ocr.enabled = false;
    }
    if let Some(dir) = &args.model_dir {
        config.models.model_dir = dir.clone();
    }
}

fn progress_bar(pages: u64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(pages);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    pb.set_message("Reading pages...");
    Ok(pb)
}

/// Add the format's extension when `path` has none.
fn with_format_extension(path: &Path, format: OutputFormat) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

fn print_report(
    outcome: &ExtractionOutcome,
    table: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let report = RunReport::new(outcome, table, format, output);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_extension_added_when_missing() {
        assert_eq!(
            with_format_extension(Path::new("out/table"), OutputFormat::Tsv),
            PathBuf::from("out/table.tsv")
        );
        assert_eq!(
            with_format_extension(Path::new("table.txt"), OutputFormat::Csv),
            PathBuf::from("table.txt")
        );
    }

    #[test]
    fn test_report_shape() {
        let outcome = ExtractionOutcome {
            rows: vec![
                vec!["page_number".to_string(), "v".to_string()],
                vec!["2".to_string(), "x".to_string()],
            ],
            extracted_pages: 1,
            total_pages: 3,
        };
        let report = RunReport::new(&outcome, "page_number,v\n2,x", OutputFormat::Csv, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["format"], "CSV");
        assert_eq!(json["mime_type"], "text/csv");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["data_rows"], 1);
        assert_eq!(json["total_pages"], 3);
        assert!(json.get("output").is_none());
    }
}
