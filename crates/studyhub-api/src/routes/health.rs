//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::AppState;

static STARTED: OnceLock<Instant> = OnceLock::new();

pub fn router() -> Router<Arc<AppState>> {
    // Start the uptime clock when routes are built, not on first probe.
    STARTED.get_or_init(Instant::now);
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    /// Writes accepted per batch by the backing store.
    max_batch_ops: usize,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: STARTED.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        max_batch_ops: state.engine.db().store.max_batch_ops(),
    })
}
