//! `vidgate ingest` command implementation

use crate::error::Result;
use crate::progress::create_spinner;
use colored::Colorize;
use std::path::PathBuf;
use vidgate_common::bytes::format_bytes;
use vidgate_ingest::IngestionOrchestrator;

/// Ingest a remote media file
pub async fn run(
    orchestrator: &IngestionOrchestrator,
    url: String,
    dest: Option<PathBuf>,
) -> Result<()> {
    let spinner = create_spinner(&format!("Ingesting {}", url));
    let outcome = orchestrator.run(&url, dest).await;
    spinner.finish_and_clear();

    let ingested = outcome?;

    println!(
        "{} Ingested via {} method",
        "✓".green(),
        ingested.method.to_string().bold()
    );
    println!("  File: {}", ingested.file_path.display());
    println!("  Size: {}", format_bytes(ingested.size_bytes));

    Ok(())
}
