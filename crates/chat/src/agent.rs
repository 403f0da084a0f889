//! Decouples [`ChatBridge`](crate::bridge::ChatBridge) from any concrete
//! LLM/tool-loop implementation — only the [`AgentEvent`] stream crosses
//! the boundary (spec.md §1: "only its `AgentEvent` stream is consumed").

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::event::AgentEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// A conversational agent bound to one session. Constructed fresh on a
/// [`AgentCache`](crate::cache::AgentCache) miss, wired with domain
/// tools, the user profile, and the session's rehydrated history —
/// all of which is the concrete agent's concern, not this crate's.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Replaces the agent's dynamic system-prompt context block (live
    /// date/time, events, proposals, contacts, memory snippets, ...)
    /// ahead of the next `run` call.
    async fn inject_context(&self, context: &str);

    /// Drives one turn and yields its `AgentEvent`s in production order.
    async fn run(&self, message: &str) -> EventStream;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use futures::stream;

    use super::*;

    /// Records the last injected context and replays a fixed event script.
    pub struct ScriptedAgent {
        pub events: Vec<AgentEvent>,
        pub last_context: Mutex<Option<String>>,
    }

    impl ScriptedAgent {
        pub fn new(events: Vec<AgentEvent>) -> Self {
            Self { events, last_context: Mutex::new(None) }
        }
    }

    #[async_trait]
    impl ChatAgent for ScriptedAgent {
        async fn inject_context(&self, context: &str) {
            *self.last_context.lock().unwrap() = Some(context.to_string());
        }

        async fn run(&self, _message: &str) -> EventStream {
            Box::pin(stream::iter(self.events.clone()))
        }
    }
}
