//! Pages command - report a document's page count.

use std::path::PathBuf;

use clap::Args;
use harvest_core::pdf::{PdfExtractor, PdfProcessor};

/// Arguments for the pages command.
#[derive(Args)]
pub struct PagesArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,
}

pub fn run(args: PagesArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extractor = PdfExtractor::open(&args.input)?;
    println!("{}", extractor.page_count());
    Ok(())
}
