//! Vidgate Ingestion Pipeline
//!
//! Adaptive ingestion of large remote media files into local storage.
//! Remote hosts are unreliable: they redirect, throttle, misreport size, or
//! serve HTML interstitials instead of binary content. This crate handles
//! that with size probing, per-resource mutual exclusion, disk-space
//! admission control, and adaptive selection between a lightweight stream
//! download and a heavyweight subprocess tool, with one method-level
//! fallback per attempt.
//!
//! # Overview
//!
//! - [`resource_key`] - Normalized resource identifiers from share-link URLs
//! - [`lock`] - Non-blocking per-resource locks with TTL auto-release
//! - [`disk`] - Disk usage sampling, alert levels, admission control, cleanup
//! - [`probe`] - Lightweight size/type probes across candidate access URLs
//! - [`download`] - Stream and heavyweight download methods
//! - [`orchestrator`] - The attempt lifecycle composing all of the above
//! - [`config`] - Pipeline configuration
//!
//! # Example
//!
//! ```no_run
//! use vidgate_ingest::{IngestionOrchestrator, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = IngestionOrchestrator::new(PipelineConfig::from_env()?)?;
//!     let result = orchestrator
//!         .ingest("https://drive.google.com/file/d/1aBcDeFgHiJkLmNo/view", None)
//!         .await;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod disk;
pub mod download;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod probe;
pub mod resource_key;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use disk::{AlertLevel, DiskGuard, DiskSnapshot, HealthStatus};
pub use download::{IngestMethod, MediaDownloader};
pub use error::{IngestError, Result};
pub use lock::ResourceLock;
pub use orchestrator::{IngestionOrchestrator, IngestionResult, MethodUsed};
pub use probe::{SizeEstimate, SizeProbe};
pub use resource_key::ResourceKey;
