use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::ApiState;

fn pref(prefs: &std::collections::HashMap<String, Value>, key: &str, default: Value) -> Value {
    prefs.get(key).cloned().unwrap_or(default)
}

fn build_settings(state: &ApiState) -> anyhow::Result<Value> {
    let prefs = state.resources.store.all_preferences()?;
    Ok(json!({
        "profile": {
            "name": pref(&prefs, "user_name", json!("")),
            "timezone": pref(&prefs, "timezone", json!("UTC")),
            "language": pref(&prefs, "language", json!("en")),
        },
        "notifications": {
            "silent": pref(&prefs, "notify_silent", json!(true)),
            "fyi": pref(&prefs, "notify_fyi", json!(true)),
            "important": pref(&prefs, "notify_important", json!(true)),
            "critical": pref(&prefs, "notify_critical", json!(true)),
        },
        "llm": {
            "primary_provider": pref(&prefs, "llm_primary", json!("deepseek")),
            "fallback_provider": pref(&prefs, "llm_fallback", json!("openai")),
            "monthly_budget": pref(&prefs, "llm_budget", json!(10.0)),
            "current_month_cost": pref(&prefs, "llm_month_cost", json!(0.0)),
        },
        "appearance": {
            "theme": pref(&prefs, "theme", json!("dark")),
        },
    }))
}

pub async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    Ok(Json(build_settings(&state)?))
}

fn llm_pref_key(k: &str) -> String {
    match k {
        "primary_provider" => "llm_primary".to_string(),
        "fallback_provider" => "llm_fallback".to_string(),
        "monthly_budget" => "llm_budget".to_string(),
        other => other.to_string(),
    }
}

pub async fn update_settings(State(state): State<ApiState>, Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let store = &state.resources.store;
    if let Some(profile) = body.get("profile").and_then(Value::as_object) {
        for (k, v) in profile {
            let key = if k == "name" { "user_name".to_string() } else { k.clone() };
            store.set_preference(&key, v, 1.0, "api")?;
        }
    }
    if let Some(notifications) = body.get("notifications").and_then(Value::as_object) {
        for (k, v) in notifications {
            store.set_preference(&format!("notify_{k}"), v, 1.0, "api")?;
        }
    }
    if let Some(llm) = body.get("llm").and_then(Value::as_object) {
        for (k, v) in llm {
            store.set_preference(&llm_pref_key(k), v, 1.0, "api")?;
        }
    }
    if let Some(appearance) = body.get("appearance").and_then(Value::as_object) {
        for (k, v) in appearance {
            store.set_preference(k, v, 1.0, "api")?;
        }
    }
    Ok(Json(build_settings(&state)?))
}
