use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_events(State(state): State<ApiState>, Query(q): Query<EventsQuery>) -> ApiResult<Json<Value>> {
    let limit = q.limit.clamp(1, 200);
    let source = if q.source.is_empty() { None } else { Some(q.source.as_str()) };
    let events = state.resources.store.query_events(source, None, None, None, limit, false)?;
    Ok(Json(json!(events)))
}
