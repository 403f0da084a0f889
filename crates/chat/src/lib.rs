//! `AgentChatBridge` and its supporting pieces — spec.md §4.10.

pub mod agent;
pub mod bridge;
pub mod cache;
pub mod dereasoning;
pub mod event;
pub mod extractor;
pub mod sanitizer;

pub use agent::{ChatAgent, EventStream};
pub use bridge::ChatBridge;
pub use cache::{AgentCache, AgentFactory, MAX_CACHED_AGENTS};
pub use dereasoning::{is_reasoning_line, passes_dereasoning_filter, strip_reasoning_lines};
pub use event::AgentEvent;
pub use extractor::ConversationExtractor;
pub use sanitizer::{RegexSanitizer, SanitizeResult, Sanitizer};
