//! `vidgate probe` command implementation
//!
//! Pre-flight advisory: reports which method an ingestion would use without
//! acquiring locks or touching disk.

use crate::error::Result;
use colored::Colorize;
use vidgate_ingest::{IngestMethod, IngestionOrchestrator, ResourceKey};

/// Probe a URL and report the recommended method
pub async fn run(orchestrator: &IngestionOrchestrator, url: String) -> Result<()> {
    let key = ResourceKey::derive(&url);
    let method = orchestrator.recommended_method(&url).await;

    println!("Resource key: {}", key.as_str().bold());
    match method {
        IngestMethod::Stream => {
            println!("{} Recommended method: stream (direct HTTP download)", "✓".green());
        },
        IngestMethod::Heavyweight => {
            println!(
                "{} Recommended method: heavyweight (large or type-ambiguous; external tool)",
                "!".yellow()
            );
        },
    }

    Ok(())
}
