//! `vidgate disk` command implementation

use crate::error::Result;
use colored::Colorize;
use vidgate_common::bytes::{format_bytes, mb_to_bytes};
use vidgate_ingest::{AlertLevel, IngestionOrchestrator};

/// Show disk usage and alert level
pub async fn run(orchestrator: &IngestionOrchestrator) -> Result<()> {
    let health = orchestrator.disk().health().await;

    let status = match health.status {
        AlertLevel::None => "healthy".green(),
        AlertLevel::Warning => "warning".yellow(),
        AlertLevel::Critical => "critical".red(),
        AlertLevel::Emergency => "emergency".red().bold(),
    };
    println!("Status: {}", status);

    match health.disk {
        Some(snapshot) => {
            println!("  Total: {}", format_bytes(mb_to_bytes(snapshot.total_mb)));
            println!("  Used:  {} ({:.1}%)", format_bytes(mb_to_bytes(snapshot.used_mb)), snapshot.usage_percent);
            println!("  Free:  {}", format_bytes(mb_to_bytes(snapshot.free_mb)));
        },
        None => {
            println!("  Disk usage could not be sampled");
        },
    }

    if let Some(alert) = health.alert {
        println!("  {} {}", "!".yellow(), alert);
    }

    let held = orchestrator.lock().held_keys();
    if !held.is_empty() {
        println!("Active ingestions:");
        for key in held {
            println!("  {}", key);
        }
    }

    Ok(())
}
