use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub async fn get_patterns(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let Some(detector) = state.resources.patterns.clone() else {
        return Err(ApiError::Unavailable("Pattern detector not available".to_string()));
    };
    Ok(Json(json!({
        "patterns": detector.get_patterns(),
        "strong_patterns": detector.get_strong_patterns(),
        "proposals": detector.propose_automations(),
        "summary": detector.summary()?,
    })))
}

pub async fn weekly(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let Some(detector) = state.resources.patterns.clone() else {
        return Err(ApiError::Unavailable("Pattern detector not available".to_string()));
    };
    Ok(Json(detector.weekly_analysis()?))
}
