//! Vidgate Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the Vidgate project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all Vidgate workspace
//! members:
//!
//! - **Logging**: Centralized tracing configuration and initialization
//! - **Bytes**: Human-readable size formatting and unit conversion
//!
//! # Example
//!
//! ```no_run
//! use vidgate_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod bytes;
pub mod logging;
