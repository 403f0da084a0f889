//! HTTP surface for the omnibrain daemon — spec.md §6.1. Grounded on
//! `linggen-linggen-agent`'s axum server module, generalized from its
//! one-route health/chat server to the full route table this spec
//! names, and on the original Python FastAPI app
//! (`examples/original_source/src/omnibrain/interfaces/api_server.py`)
//! for per-route semantics.

pub mod agent;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use agent::{LlmAgentFactory, LlmChatAgent};
pub use state::{ApiState, LlmModels};

/// Assembles every spec.md §6.1 route. `/health` is reachable without
/// an API key so load balancers and `omnibrain doctor` can probe
/// liveness before authenticating; `/oauth/google/callback` is
/// exempted too since it's a browser redirect target, not an API call.
pub fn build_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/status", get(routes::status::status))
        .route("/stats", get(routes::stats::stats))
        .route("/briefing", get(routes::briefing::get_briefing))
        .route("/briefing/generate", post(routes::briefing::generate_briefing))
        .route("/briefing/data", get(routes::briefing::get_briefing_data))
        .route("/proposals", get(routes::proposals::list_proposals))
        .route("/proposals/{id}/approve", post(routes::proposals::approve))
        .route("/proposals/{id}/reject", post(routes::proposals::reject))
        .route("/proposals/{id}/snooze", post(routes::proposals::snooze))
        .route("/search", get(routes::search::search))
        .route("/events", get(routes::events::list_events))
        .route("/contacts", get(routes::contacts::list_contacts))
        .route("/message", post(routes::message::process_message))
        .route("/chat", post(routes::chat::chat_stream))
        .route("/chat/sessions", get(routes::chat::list_sessions))
        .route("/chat/sessions/{session_id}", delete(routes::chat::delete_session))
        .route("/chat/history", get(routes::chat::get_history))
        .route("/skills", get(routes::skills::list_skills))
        .route("/skills/runtime", get(routes::skills::runtime_status))
        .route("/skills/{name}/install", post(routes::skills::install_skill))
        .route("/skills/{name}", delete(routes::skills::remove_skill))
        .route("/skills/{name}/enable", post(routes::skills::enable_skill))
        .route("/skills/{name}/disable", post(routes::skills::disable_skill))
        .route("/settings", get(routes::settings::get_settings))
        .route("/settings", put(routes::settings::update_settings))
        .route("/oauth/google", get(routes::oauth::start))
        .route("/oauth/google/status", get(routes::oauth::status))
        .route("/oauth/google/disconnect", post(routes::oauth::disconnect))
        .route("/onboarding/analyze", post(routes::onboarding::analyze))
        .route("/onboarding/profile", post(routes::onboarding::save_profile))
        .route("/knowledge/query", get(routes::knowledge::query))
        .route("/knowledge/contact/{identifier}", get(routes::knowledge::contact))
        .route("/patterns", get(routes::patterns::get_patterns))
        .route("/patterns/weekly", get(routes::patterns::weekly))
        .route("/feed", get(routes::feed::feed))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(routes::status::health))
        .route("/oauth/google/callback", get(routes::oauth::callback))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
