//! Operations routes
//!
//! Health check with the live subscriber count and fan-out counters.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::state::AppState;
use crate::subscriptions::DispatchSummary;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Server status
    pub status: &'static str,
    /// Connected real-time subscribers
    pub subscribers: usize,
    /// Fan-out counters
    #[serde(flatten)]
    pub dispatch: DispatchSummary,
}

/// Operations routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let broadcaster = state.broadcaster();

    Json(HealthResponse {
        status: "ok",
        subscribers: broadcaster.subscriber_count(),
        dispatch: broadcaster.stats(),
    })
}
