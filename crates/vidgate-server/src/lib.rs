//! Vidgate Server
//!
//! Thin HTTP surface over the ingestion pipeline: an ingest endpoint, a
//! probe-only advisory endpoint, and the operational surfaces (health
//! snapshot and held-lock listing) consumed by external monitoring. The
//! server knows nothing about posts, accounts, or publishing; its only
//! outputs are `IngestionResult` values and disk alerts.

pub mod api;
pub mod config;
pub mod routes;

use std::sync::Arc;
use vidgate_ingest::IngestionOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IngestionOrchestrator>,
}
