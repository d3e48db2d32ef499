//! Liveness route handlers

use crate::state::SharedState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

/// Creates routes for liveness probes
pub fn routes() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

/// Response for the liveness probe
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: &'static str,

    /// Number of registered tools
    pub tools: usize,

    /// Number of open MCP sessions
    pub sessions: usize,
}

/// Endpoint: GET /health
async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        tools: state.dispatcher.registry().len(),
        sessions: state.sessions.len(),
    })
}
