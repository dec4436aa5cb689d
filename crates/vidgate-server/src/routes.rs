//! HTTP routes for the ingestion surface

use crate::api::{ApiResponse, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidgate_ingest::{AlertLevel, IngestError};

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/locks", get(locks))
        .route("/api/ingest", post(ingest))
        .route("/api/ingest/recommend", get(recommend))
        .with_state(state)
}

/// Health snapshot for external monitoring
///
/// GET /health
async fn health(State(state): State<AppState>) -> Response {
    let status = state.orchestrator.disk().health().await;
    let code = match status.status {
        AlertLevel::None | AlertLevel::Warning => StatusCode::OK,
        AlertLevel::Critical | AlertLevel::Emergency => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(status)).into_response()
}

/// Currently held resource locks, for operational debugging
///
/// GET /locks
async fn locks(State(state): State<AppState>) -> Response {
    ApiResponse::success(state.orchestrator.lock().entries()).into_response()
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    url: String,
    #[serde(default)]
    dest: Option<PathBuf>,
}

/// Run one ingestion attempt
///
/// POST /api/ingest {"url": "...", "dest": "..."}
async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Response {
    match state.orchestrator.run(&request.url, request.dest).await {
        Ok(ingested) => ApiResponse::success(serde_json::json!({
            "file_path": ingested.file_path,
            "file_size_bytes": ingested.size_bytes,
            "method_used": ingested.method,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct RecommendQuery {
    url: String,
}

#[derive(Debug, Serialize)]
struct RecommendResponse {
    method: vidgate_ingest::IngestMethod,
}

/// Probe-only advisory: which method would be chosen
///
/// GET /api/ingest/recommend?url=...
async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Response {
    let method = state.orchestrator.recommended_method(&query.url).await;
    ApiResponse::success(RecommendResponse { method }).into_response()
}

/// Map pipeline failures onto HTTP statuses
///
/// Rejections ("not attempted") get distinct statuses from transfer
/// failures ("attempted and failed").
fn error_response(error: IngestError) -> Response {
    let (status, code) = match &error {
        IngestError::LockContention { .. } => (StatusCode::CONFLICT, "ALREADY_IN_PROGRESS"),
        IngestError::AdmissionDenied { .. } => {
            (StatusCode::INSUFFICIENT_STORAGE, "ADMISSION_DENIED")
        },
        IngestError::AllMethodsExhausted { .. } => {
            (StatusCode::BAD_GATEWAY, "ALL_METHODS_EXHAUSTED")
        },
        IngestError::DiskUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "DISK_UNAVAILABLE"),
        IngestError::TransferFailed { .. } => (StatusCode::BAD_GATEWAY, "TRANSFER_FAILED"),
        IngestError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
    };
    ErrorResponse::new(code, error.to_string()).with_status(status)
}
