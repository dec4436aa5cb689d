//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod clean;
pub mod disk;
pub mod ingest;
pub mod probe;
