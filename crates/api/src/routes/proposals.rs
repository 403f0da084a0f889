use axum::extract::{Path, State};
use axum::Json;
use omnibrain_store::schema::ProposalStatus;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::ApiState;

pub async fn list_proposals(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let proposals = state.resources.store.list_pending_proposals()?;
    Ok(Json(json!(proposals)))
}

fn act(state: &ApiState, id: i64, status: ProposalStatus, result: Option<&str>) -> ApiResult<Json<Value>> {
    state.resources.store.update_proposal_status(id, status, result)?;
    Ok(Json(json!({ "ok": true, "proposal_id": id, "new_status": status.as_str() })))
}

pub async fn approve(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    act(&state, id, ProposalStatus::Approved, None)
}

#[derive(Deserialize, Default)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Option<Json<RejectBody>>,
) -> ApiResult<Json<Value>> {
    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    act(&state, id, ProposalStatus::Rejected, Some(&reason))
}

pub async fn snooze(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let until = chrono::Utc::now() + chrono::Duration::hours(3);
    state.resources.store.snooze_proposal(id, until)?;
    Ok(Json(json!({ "ok": true, "proposal_id": id, "new_status": "snoozed" })))
}
