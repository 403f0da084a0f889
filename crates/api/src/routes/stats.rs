use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::error::ApiResult;
use crate::state::ApiState;

/// Aggregate counters — the teacher's `Store` has no single `get_stats`
/// query, so this composes the per-table counts its tests already cover.
pub fn collect(state: &ApiState) -> anyhow::Result<Map<String, Value>> {
    let store = &state.resources.store;
    let mut map = Map::new();
    map.insert("memory_documents".to_string(), json!(store.count_memory_documents()?));
    map.insert("pending_proposals".to_string(), json!(store.list_pending_proposals()?.len()));
    map.insert("contacts".to_string(), json!(store.list_contacts(100_000)?.len()));
    map.insert("installed_skills".to_string(), json!(store.list_skills()?.len()));
    Ok(map)
}

/// `GET /api/v1/stats`.
pub async fn stats(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    Ok(Json(Value::Object(collect(&state)?)))
}
