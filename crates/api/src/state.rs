//! Shared application state handed to every route handler — spec.md
//! §6.1. Grounded on `linggen-linggen-agent`'s `ServerState`: one struct
//! wrapping the long-lived collaborators, cloned cheaply behind `Arc`s.

use std::sync::Arc;
use std::time::Instant;

use omnibrain_chat::ChatBridge;
use omnibrain_daemon::ResourceContainer;
use omnibrain_llm::Provider;
use omnibrain_skills::SkillRuntime;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The provider/model triple `/message` and [`crate::agent::LlmAgentFactory`]
/// both need, read once out of `AppConfig` at startup.
#[derive(Clone)]
pub struct LlmModels {
    pub primary: Provider,
    pub ollama_model: String,
    pub openrouter_model: String,
}

#[derive(Clone)]
pub struct ApiState {
    pub resources: Arc<ResourceContainer>,
    pub chat: Arc<ChatBridge>,
    pub skill_runtime: Option<Arc<SkillRuntime>>,
    pub api_key: Option<Arc<str>>,
    pub llm_models: LlmModels,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(
        resources: Arc<ResourceContainer>,
        chat: Arc<ChatBridge>,
        skill_runtime: Option<Arc<SkillRuntime>>,
        api_key: Option<String>,
        llm_models: LlmModels,
    ) -> Self {
        Self {
            resources,
            chat,
            skill_runtime,
            api_key: api_key.map(|k| k.into()),
            llm_models,
            started_at: Instant::now(),
        }
    }
}
