use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub async fn list_skills(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let skills = state.resources.store.list_skills()?;
    Ok(Json(json!({ "skills": skills })))
}

/// `GET /api/v1/skills/runtime` — best-effort live status: the only
/// thing a runtime exposes beyond what's in `Store` is what's currently
/// registered, so an absent runtime reports zero rather than erroring.
pub async fn runtime_status(State(state): State<ApiState>) -> Json<Value> {
    let Some(_runtime) = state.skill_runtime.clone() else {
        return Json(json!({ "running": false, "skill_count": 0, "skills": {} }));
    };
    let skill_count = state.resources.store.list_skills().map(|s| s.len()).unwrap_or(0);
    Json(json!({ "running": true, "skill_count": skill_count }))
}

#[derive(Deserialize, Default)]
pub struct InstallSkillBody {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

fn default_category() -> String {
    "other".to_string()
}

pub async fn install_skill(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Option<Json<InstallSkillBody>>,
) -> ApiResult<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let now = chrono::Utc::now();
    let skill = omnibrain_store::schema::InstalledSkill {
        name,
        version: body.version,
        description: body.description,
        author: body.author,
        category: body.category,
        permissions: body.permissions,
        enabled: true,
        installed_at: now,
        updated_at: now,
        settings: Value::Null,
        data: Value::Null,
    };
    state.resources.store.register_skill_if_absent(&skill)?;
    Ok(Json(json!({ "status": "installed" })))
}

pub async fn remove_skill(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult<Json<Value>> {
    if state.resources.store.get_skill(&name)?.is_none() {
        return Err(ApiError::NotFound(format!("Skill '{name}' not found")));
    }
    state.resources.store.delete_skill(&name)?;
    Ok(Json(json!({ "status": "removed" })))
}

async fn set_enabled(state: &ApiState, name: &str, enabled: bool) -> ApiResult<Json<Value>> {
    if state.resources.store.get_skill(name)?.is_none() {
        return Err(ApiError::NotFound(format!("Skill '{name}' not found")));
    }
    state.resources.store.set_skill_enabled(name, enabled)?;
    let status = if enabled { "enabled" } else { "disabled" };
    Ok(Json(json!({ "status": status })))
}

pub async fn enable_skill(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult<Json<Value>> {
    set_enabled(&state, &name, true).await
}

pub async fn disable_skill(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult<Json<Value>> {
    set_enabled(&state, &name, false).await
}
