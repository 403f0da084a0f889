use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct QueryParams {
    pub q: String,
    #[serde(default = "default_days")]
    pub days: i64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}
fn default_days() -> i64 {
    90
}
fn default_max_results() -> usize {
    20
}

pub async fn query(State(state): State<ApiState>, Query(q): Query<QueryParams>) -> ApiResult<Json<Value>> {
    let Some(graph) = state.resources.knowledge.clone() else {
        return Err(ApiError::Unavailable("Knowledge graph not available".to_string()));
    };
    let items = graph.ask(&q.q, q.days, q.max_results.clamp(1, 100))?;
    Ok(Json(json!({ "question": q.q, "results": items })))
}

pub async fn contact(State(state): State<ApiState>, Path(identifier): Path<String>) -> ApiResult<Json<Value>> {
    let Some(graph) = state.resources.knowledge.clone() else {
        return Err(ApiError::Unavailable("Knowledge graph not available".to_string()));
    };
    let Some(summary) = graph.get_contact_summary(&identifier)? else {
        return Err(ApiError::NotFound(format!("No contact matching '{identifier}'")));
    };
    Ok(Json(json!(summary)))
}
