//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Connected progress-channel listeners.
    pub listeners: usize,
    /// Artifacts currently held in the store.
    pub artifacts: usize,
    pub artifact_bytes: usize,
}

/// GET /health
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        listeners: ctx.progress.listener_count(),
        artifacts: ctx.store.len(),
        artifact_bytes: ctx.store.total_bytes(),
    })
}
