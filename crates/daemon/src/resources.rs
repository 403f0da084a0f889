//! `ResourceContainer` — spec.md §4.11: constructed once at startup, in
//! dependency order. Each optional collaborator is individually
//! try-guarded: a failing init logs a warning and leaves the slot
//! `None` rather than aborting startup, so downstream components must
//! tolerate absence.
//!
//! Grounded on `crates/runtime/src/server/mod.rs`'s `DaemonState`
//! construction, generalized from the teacher's single `MemoryManager`
//! + `ToolExecutor` pair to the full subsystem list this spec names.

use std::sync::Arc;

use async_trait::async_trait;
use omnibrain_briefing::{BriefingGenerator, NarrativeLlm, ReviewEngine};
use omnibrain_bus::EventBus;
use omnibrain_chat::{RegexSanitizer, Sanitizer};
use omnibrain_config::AppConfig;
use omnibrain_knowledge::KnowledgeGraph;
use omnibrain_llm::{LlmRouter, Provider};
use omnibrain_memory::Memory;
use omnibrain_patterns::PatternDetector;
use omnibrain_store::Store;
use omnibrain_transparency::TransparencyLogger;
use tracing::warn;

use crate::approval::ApprovalGate;
use crate::context_tracker::ContextTracker;
use crate::preference_model::PreferenceModel;
use crate::secure_storage::SecureStorage;

/// Adapts [`LlmRouter`]'s two-model fallback chat call to the single
/// `(system, prompt) -> text` shape [`BriefingGenerator`] needs,
/// folding `system` into the prompt since the router has no separate
/// system-message slot.
struct LlmNarrator {
    router: Arc<LlmRouter>,
    primary: Provider,
    ollama_model: String,
    openrouter_model: String,
}

#[async_trait]
impl NarrativeLlm for LlmNarrator {
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let combined = format!("{system}\n\n{prompt}");
        let (_, text) = self
            .router
            .chat_with_fallback(self.primary, &self.ollama_model, &self.openrouter_model, &combined)
            .await?;
        Ok(text)
    }
}

/// Every long-lived collaborator a running daemon may consult. Built
/// once in [`ResourceContainer::build`] and shared behind `Arc`s by
/// every task spawned in `Daemon::run`.
pub struct ResourceContainer {
    pub store: Arc<Store>,
    pub bus: Arc<EventBus>,
    pub memory: Option<Arc<Memory>>,
    pub llm: Option<Arc<LlmRouter>>,
    pub briefing: Option<Arc<BriefingGenerator>>,
    pub knowledge: Option<Arc<KnowledgeGraph>>,
    pub patterns: Option<Arc<PatternDetector>>,
    pub review: Option<Arc<ReviewEngine>>,
    pub approval: Arc<ApprovalGate>,
    pub sanitizer: Option<Arc<dyn Sanitizer>>,
    pub context_tracker: Arc<ContextTracker>,
    pub transparency: Option<Arc<TransparencyLogger>>,
    pub secure_storage: Option<Arc<SecureStorage>>,
    pub preferences: Arc<PreferenceModel>,
}

impl ResourceContainer {
    /// Initializes every subsystem in the dependency order spec.md
    /// lists: Memory, LLM Router, BriefingGenerator, KnowledgeGraph,
    /// PatternDetector, ReviewEngine, ApprovalGate, Sanitizer,
    /// ContextTracker, TransparencyLogger, SecureStorage,
    /// PreferenceModel. `store` and `bus` are required — without a
    /// store there is nothing for the daemon to do.
    pub fn build(store: Arc<Store>, config: &AppConfig) -> Self {
        let bus = Arc::new(EventBus::new());

        let memory = guard("memory", || Ok::<_, anyhow::Error>(Memory::new(store.clone())));

        let llm = guard("llm router", || Ok::<_, anyhow::Error>(LlmRouter::default()));

        let primary_provider =
            if config.llm.provider.eq_ignore_ascii_case("openrouter") { Provider::OpenRouter } else { Provider::Ollama };
        let briefing = {
            let mut generator = BriefingGenerator::new(store.clone());
            if let Some(memory) = memory.clone() {
                generator = generator.with_memory(memory);
            }
            if let Some(llm) = llm.clone() {
                let narrator: Arc<dyn omnibrain_briefing::NarrativeLlm> = Arc::new(LlmNarrator {
                    router: llm,
                    primary: primary_provider,
                    ollama_model: config.llm.ollama_model.clone(),
                    openrouter_model: config.llm.openrouter_model.clone(),
                });
                generator = generator.with_llm(narrator);
            }
            Some(Arc::new(generator))
        };

        let knowledge = memory
            .clone()
            .and_then(|memory| guard("knowledge graph", || Ok::<_, anyhow::Error>(KnowledgeGraph::new(store.clone(), memory))));

        let patterns = guard("pattern detector", || Ok::<_, anyhow::Error>(PatternDetector::new(store.clone())));

        let review = Some(Arc::new({
            let mut engine = ReviewEngine::new(store.clone());
            if let Some(memory) = memory.clone() {
                engine = engine.with_memory(memory);
            }
            engine
        }));

        let approval = Arc::new(ApprovalGate::new(config.safety.approval_exempt_tools.iter().cloned()));

        let sanitizer: Option<Arc<dyn Sanitizer>> =
            guard("sanitizer", || Ok::<_, anyhow::Error>(RegexSanitizer)).map(|s| s as Arc<dyn Sanitizer>);

        let context_tracker = Arc::new(ContextTracker::new());

        let transparency = guard("transparency logger", || Ok::<_, anyhow::Error>(TransparencyLogger::new(store.clone())));

        let secure_storage = config.daemon.encryption_key.as_deref().and_then(|key| {
            let path = std::path::PathBuf::from(&config.agent.data_dir).join(".secrets.bin");
            guard("secure storage", || SecureStorage::open(&path, key))
        });

        let preferences = Arc::new(PreferenceModel::new(store.clone()));

        Self {
            store,
            bus,
            memory,
            llm,
            briefing,
            knowledge,
            patterns,
            review,
            approval,
            sanitizer,
            context_tracker,
            transparency,
            secure_storage,
            preferences,
        }
    }
}

/// Runs `init`, logging a warning and returning `None` on failure
/// instead of propagating — the pattern every optional collaborator in
/// [`ResourceContainer::build`] shares.
fn guard<T, E: std::fmt::Display>(name: &str, init: impl FnOnce() -> Result<T, E>) -> Option<Arc<T>> {
    match init() {
        Ok(value) => Some(Arc::new(value)),
        Err(err) => {
            warn!(subsystem = name, error = %err, "optional subsystem failed to initialize, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_succeeds_with_a_bare_store_and_default_config() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = AppConfig::default();
        let resources = ResourceContainer::build(store, &config);
        assert!(resources.memory.is_some());
        assert!(resources.review.is_some());
        assert!(resources.secure_storage.is_none());
    }

    #[test]
    fn secure_storage_initializes_when_an_encryption_key_is_configured() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut config = AppConfig::default();
        config.daemon.encryption_key = Some("test-key".to_string());
        let dir = std::env::temp_dir().join(format!("omnibrain-resources-test-{}", std::process::id()));
        config.agent.data_dir = dir.to_string_lossy().to_string();
        let resources = ResourceContainer::build(store, &config);
        assert!(resources.secure_storage.is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
