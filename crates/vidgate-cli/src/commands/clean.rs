//! `vidgate clean` command implementation
//!
//! Removes stale scratch files owned by the pipeline.

use crate::error::Result;
use colored::Colorize;
use vidgate_common::bytes::{format_bytes, mb_to_bytes};
use vidgate_ingest::IngestionOrchestrator;

/// Run a scratch cleanup pass
pub async fn run(orchestrator: &IngestionOrchestrator) -> Result<()> {
    let report = orchestrator.disk().cleanup_temp_files().await;

    if report.files_removed == 0 {
        println!("No stale scratch files to remove");
    } else {
        println!("{} Removed {} file(s)", "✓".green(), report.files_removed);
        println!("  Freed: {}", format_bytes(mb_to_bytes(report.space_freed_mb)));
    }

    Ok(())
}
