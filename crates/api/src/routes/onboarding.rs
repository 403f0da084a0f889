//! First-time analysis and conversational profile capture — spec.md
//! §1. The Google-backed "holy shit moment" analysis depends on the
//! out-of-scope OAuth integration; the conversational profile path
//! needs no Google connection and is implemented in full.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub async fn analyze() -> Result<Json<Value>, ApiError> {
    Err(ApiError::BadRequest("Google not connected — complete OAuth first".to_string()))
}

#[derive(Deserialize, Default)]
pub struct ProfileBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub work: Option<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

pub async fn save_profile(State(state): State<ApiState>, Json(body): Json<ProfileBody>) -> ApiResult<Json<Value>> {
    let store = &state.resources.store;
    let mut saved = serde_json::Map::new();

    if let Some(name) = &body.name {
        store.set_preference("user_name", &json!(name), 1.0, "onboarding_chat")?;
        saved.insert("name".to_string(), json!(name));
    }
    if let Some(work) = &body.work {
        store.set_preference("user_work", &json!(work), 1.0, "onboarding_chat")?;
        saved.insert("work".to_string(), json!(work));
    }
    if let Some(goals) = &body.goals {
        store.set_preference("user_goals", &json!(goals), 1.0, "onboarding_chat")?;
        saved.insert("goals".to_string(), json!(goals));
    }
    if let Some(timezone) = &body.timezone {
        store.set_preference("timezone", &json!(timezone), 1.0, "onboarding_chat")?;
        saved.insert("timezone".to_string(), json!(timezone));
    }

    if let Some(memory) = state.resources.memory.clone() {
        let mut parts = Vec::new();
        if let Some(name) = &body.name {
            parts.push(format!("The user's name is {name}."));
        }
        if let Some(work) = &body.work {
            parts.push(format!("They work on: {work}."));
        }
        if let Some(goals) = &body.goals {
            parts.push(format!("Their goals: {goals}."));
        }
        if !parts.is_empty() {
            let _ = memory.store(&parts.join(" "), None, "onboarding", "profile", Vec::new(), Value::Null);
        }
    }

    store.set_preference("onboarding_complete", &json!(true), 1.0, "onboarding_chat")?;

    Ok(Json(json!({ "ok": true, "saved": saved })))
}
