use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::{ApiState, API_VERSION};

/// `GET /api/v1/health` — never requires auth, used for liveness probes.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/v1/status`.
pub async fn status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let uptime = state.started_at.elapsed().as_secs_f64();
    let stats = crate::routes::stats::collect(&state).unwrap_or_default();
    Json(json!({
        "version": API_VERSION,
        "uptime_seconds": (uptime * 10.0).round() / 10.0,
        "stats": stats,
    }))
}
