use axum::extract::{Path, Query, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use crate::error::ApiResult;
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /api/v1/chat` — streams one turn over Server-Sent Events.
pub async fn chat_stream(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> Sse<impl tokio_stream::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    let session_id = body.session_id.unwrap_or_else(|| "default".to_string());
    let stream = state.chat.clone().stream(session_id, body.message).map(Ok);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
pub struct SessionsQuery {
    #[serde(default = "default_sessions_limit")]
    pub limit: usize,
}

fn default_sessions_limit() -> usize {
    20
}

pub async fn list_sessions(State(state): State<ApiState>, Query(q): Query<SessionsQuery>) -> ApiResult<Json<Value>> {
    let mut sessions = state.resources.store.list_chat_sessions()?;
    sessions.truncate(q.limit.clamp(1, 100));
    Ok(Json(json!({ "sessions": sessions })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_session() -> String {
    "default".to_string()
}
fn default_history_limit() -> i64 {
    100
}

pub async fn get_history(State(state): State<ApiState>, Query(q): Query<HistoryQuery>) -> ApiResult<Json<Value>> {
    let limit = q.limit.clamp(1, 500);
    let messages = state.resources.store.chat_history(&q.session_id, limit)?;
    Ok(Json(json!({ "session_id": q.session_id, "messages": messages })))
}

pub async fn delete_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiResult<Json<Value>> {
    state.resources.store.delete_chat_session(&session_id)?;
    Ok(Json(json!({ "ok": true, "deleted": session_id })))
}
