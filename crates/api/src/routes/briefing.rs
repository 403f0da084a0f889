use axum::extract::{Query, State};
use axum::Json;
use chrono::Timelike;
use omnibrain_briefing::{BriefingGenerator, BriefingKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type", default = "default_type")]
    pub briefing_type: String,
}

fn default_type() -> String {
    "morning".to_string()
}

fn parse_kind(raw: &str) -> BriefingKind {
    match raw {
        "evening" => BriefingKind::Evening,
        "weekly" => BriefingKind::Weekly,
        _ => BriefingKind::Morning,
    }
}

/// `GET /api/v1/briefing` — the most recently stored briefing of `type`.
pub async fn get_briefing(State(state): State<ApiState>, Query(q): Query<TypeQuery>) -> ApiResult<Json<Value>> {
    let latest = state.resources.store.latest_briefing(&q.briefing_type)?;
    let Some(briefing) = latest else {
        return Err(ApiError::NotFound("No briefing found".to_string()));
    };
    Ok(Json(json!({
        "id": briefing.id,
        "date": briefing.date,
        "type": briefing.briefing_type,
        "content": briefing.content,
        "events_processed": briefing.events_processed,
        "actions_proposed": briefing.actions_proposed,
    })))
}

/// `POST /api/v1/briefing/generate` — collects fresh data, stores it,
/// and returns the rendered text.
pub async fn generate_briefing(State(state): State<ApiState>, Query(q): Query<TypeQuery>) -> ApiResult<Json<Value>> {
    let Some(generator) = state.resources.briefing.clone() else {
        return Err(ApiError::Unavailable("Briefing generator not configured".to_string()));
    };
    let kind = parse_kind(&q.briefing_type);
    let (data, text, id) = generator.generate_and_store(kind)?;
    Ok(Json(json!({
        "id": id,
        "date": data.date,
        "type": q.briefing_type,
        "content": text,
        "events_processed": data.events_processed(),
        "actions_proposed": data.actions_proposed(),
    })))
}

/// `GET /api/v1/briefing/data` — structured, card-friendly briefing.
/// Auto-stores a fresh briefing the first time it's requested on a given
/// day, mirroring the Python original's auto-store-on-read behavior.
pub async fn get_briefing_data(State(state): State<ApiState>, Query(q): Query<TypeQuery>) -> ApiResult<Json<Value>> {
    let user_name = state.resources.store.get_preference("user_name", Value::Null)?;
    let user_name = user_name.as_str().unwrap_or("");
    let now = chrono::Local::now();
    let period = match now.hour() {
        h if h < 12 => "morning",
        h if h < 18 => "afternoon",
        _ => "evening",
    };
    let greeting = if user_name.is_empty() {
        format!("Good {period}.")
    } else {
        format!("Good {period}, {user_name}.")
    };

    let Some(generator) = state.resources.briefing.clone() else {
        return Ok(Json(json!({
            "date": now.format("%Y-%m-%d").to_string(),
            "briefing_type": q.briefing_type,
            "greeting": greeting,
        })));
    };

    let kind = parse_kind(&q.briefing_type);
    let data = generator.collect_data(kind);
    let text = BriefingGenerator::format_text(&data);

    let today = now.format("%Y-%m-%d").to_string();
    if let Ok(latest) = state.resources.store.latest_briefing(&q.briefing_type) {
        if latest.map(|b| b.date.to_string()) != Some(today) {
            let _ = generator.generate_and_store(kind);
        }
    }

    Ok(Json(json!({
        "date": data.date,
        "briefing_type": data.briefing_type,
        "greeting": greeting,
        "emails": data.emails,
        "calendar": data.calendar,
        "proposals": data.proposals,
        "priorities": data.priorities,
        "observations": data.observations,
        "memory_highlights": data.memory_highlights,
        "content": text,
    })))
}
