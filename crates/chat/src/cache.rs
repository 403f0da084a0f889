//! Per-session agent cache — spec.md §4.10: "a per-session LRU cache of
//! at most 20 agent instances keyed by `session_id`".

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::agent::ChatAgent;

pub const MAX_CACHED_AGENTS: usize = 20;

/// Builds a fresh agent for a session on a cache miss. The concrete
/// wiring (domain tools, user profile, system-prompt loader, rehydrated
/// history) is the caller's concern.
#[async_trait::async_trait]
pub trait AgentFactory: Send + Sync {
    async fn build(&self, session_id: &str) -> anyhow::Result<Arc<dyn ChatAgent>>;
}

pub struct AgentCache {
    factory: Arc<dyn AgentFactory>,
    cache: Mutex<LruCache<String, Arc<dyn ChatAgent>>>,
}

impl AgentCache {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(MAX_CACHED_AGENTS).unwrap())),
        }
    }

    /// Returns the cached agent for `session_id`, constructing and
    /// inserting one on a miss.
    pub async fn get_or_create(&self, session_id: &str) -> anyhow::Result<Arc<dyn ChatAgent>> {
        if let Some(agent) = self.cache.lock().unwrap().get(session_id).cloned() {
            return Ok(agent);
        }
        let agent = self.factory.build(session_id).await?;
        self.cache.lock().unwrap().put(session_id.to_string(), agent.clone());
        Ok(agent)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::agent::test_support::ScriptedAgent;

    struct CountingFactory {
        builds: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AgentFactory for CountingFactory {
        async fn build(&self, _session_id: &str) -> anyhow::Result<Arc<dyn ChatAgent>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedAgent::new(vec![])))
        }
    }

    #[tokio::test]
    async fn cache_hit_does_not_rebuild() {
        let factory = Arc::new(CountingFactory { builds: AtomicUsize::new(0) });
        let cache = AgentCache::new(factory.clone());
        cache.get_or_create("session-a").await.unwrap();
        cache.get_or_create("session-a").await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_sessions_get_distinct_agents() {
        let factory = Arc::new(CountingFactory { builds: AtomicUsize::new(0) });
        let cache = AgentCache::new(factory.clone());
        cache.get_or_create("session-a").await.unwrap();
        cache.get_or_create("session-b").await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_past_capacity() {
        let factory = Arc::new(CountingFactory { builds: AtomicUsize::new(0) });
        let cache = AgentCache::new(factory);
        for i in 0..(MAX_CACHED_AGENTS + 1) {
            cache.get_or_create(&format!("session-{i}")).await.unwrap();
        }
        assert_eq!(cache.len(), MAX_CACHED_AGENTS);
    }
}
