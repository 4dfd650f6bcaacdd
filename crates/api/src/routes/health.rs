//! Liveness probe.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use orchestrator::Transport;
use serde::Serialize;

use super::AppState;

/// Name reported by the health probe.
pub const SERVICE_NAME: &str = "flexibility-orchestrator";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    /// Transactions held in memory since startup.
    pub transactions: usize,
}

/// GET /health — reports the service as up along with its store size.
pub async fn check<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        transactions: state.store.len().await,
    })
}
