//! Health endpoint exposing queue accounting.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub enqueued: u64,
    pub dropped: u64,
    pub pending: u64,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.queue.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        enqueued: stats.enqueued,
        dropped: stats.dropped,
        pending: stats.pending,
    })
}
