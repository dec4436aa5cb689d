//! Vidgate CLI - Main entry point

use clap::Parser;
use std::process;
use tracing::error;
use vidgate_cli::{Cli, CliError, Commands};
use vidgate_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use vidgate_ingest::{IngestionOrchestrator, PipelineConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("vidgate-cli".to_string())
            .build()
    } else {
        // Normal mode: only warnings and errors to console
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("vidgate-cli".to_string())
            .build()
    };
    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // Initialize logging (ignore errors as the CLI should work without it)
    let _ = init_logging(&log_config);

    // Execute command
    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> vidgate_cli::Result<()> {
    let config =
        PipelineConfig::from_env().map_err(|e| CliError::Config(e.to_string()))?;
    let orchestrator =
        IngestionOrchestrator::new(config).map_err(|e| CliError::Config(e.to_string()))?;

    match &cli.command {
        Commands::Ingest { url, dest } => {
            vidgate_cli::commands::ingest::run(&orchestrator, url.clone(), dest.clone()).await
        }

        Commands::Probe { url } => {
            vidgate_cli::commands::probe::run(&orchestrator, url.clone()).await
        }

        Commands::Disk => vidgate_cli::commands::disk::run(&orchestrator).await,

        Commands::Clean => vidgate_cli::commands::clean::run(&orchestrator).await,
    }
}
