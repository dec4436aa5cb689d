//! Vidgate CLI Library
//!
//! Command-line interface for the Vidgate ingestion pipeline:
//!
//! - **Ingestion**: Download a remote media file into local storage (`vidgate ingest`)
//! - **Probing**: Pre-flight size/method advisory (`vidgate probe`)
//! - **Disk Status**: Usage snapshot and alert level (`vidgate disk`)
//! - **Cleanup**: Remove stale scratch files (`vidgate clean`)

pub mod commands;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vidgate - Remote media ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "vidgate")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a remote media file into local storage
    Ingest {
        /// Source URL (share link or direct)
        url: String,

        /// Destination path (defaults to the scratch directory)
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },

    /// Probe a URL and report the recommended download method
    Probe {
        /// Source URL to probe
        url: String,
    },

    /// Show disk usage and alert level
    Disk,

    /// Remove stale scratch files
    Clean,
}
