//! Google OAuth — spec.md §1 carves the concrete Gmail/Calendar
//! integration out of scope ("only their interfaces are specified where
//! the core consumes them"). These routes honor the documented surface
//! but report `has_client_credentials: false` until a concrete
//! `GoogleOAuthManager` is wired in.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::ApiState;

pub async fn start() -> Result<Json<Value>, ApiError> {
    Err(ApiError::Unavailable("Google OAuth not configured — client credentials missing".to_string()))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
}

pub async fn callback(Query(q): Query<CallbackQuery>) -> Redirect {
    let base = if q.state.starts_with("http") { q.state } else { String::new() };
    let separator = if base.contains('?') { "&" } else { "?" };
    let target = if base.is_empty() {
        "/?oauth=error&message=not_configured".to_string()
    } else {
        format!("{base}{separator}oauth=error&message=not_configured")
    };
    Redirect::to(&target)
}

pub async fn status(State(_state): State<ApiState>) -> Json<Value> {
    Json(json!({ "connected": false, "has_client_credentials": false }))
}

pub async fn disconnect() -> Json<Value> {
    Json(json!({ "disconnected": false }))
}
