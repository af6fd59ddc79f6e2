//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use watchpost_worker::PipelineState;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub pipelines: PipelineCounts,
    /// Alerts dropped because the dispatcher queue was full
    pub dropped_alerts: u64,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct PipelineCounts {
    pub running: usize,
    pub stopped: usize,
    pub failed: usize,
}

/// Liveness probe with a pipeline summary.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut pipelines = PipelineCounts::default();
    for status in state.supervisor.list() {
        match (status.state, status.error.is_some()) {
            (PipelineState::Stopped, true) => pipelines.failed += 1,
            (PipelineState::Stopped, false) => pipelines.stopped += 1,
            _ => pipelines.running += 1,
        }
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        pipelines,
        dropped_alerts: state.supervisor.dropped_alerts(),
    })
}
