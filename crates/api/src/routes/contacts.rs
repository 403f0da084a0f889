use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct ContactsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list_contacts(State(state): State<ApiState>, Query(q): Query<ContactsQuery>) -> ApiResult<Json<Value>> {
    let limit = q.limit.clamp(1, 500);
    let contacts = state.resources.store.list_contacts(limit)?;
    Ok(Json(json!(contacts)))
}
