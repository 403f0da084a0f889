//! Typed events yielded by a conversational agent's run loop —
//! spec.md §4.10 step 4.

use serde::Serialize;
use serde_json::Value;

/// One step of an agent's run loop. The bridge translates each variant
/// into an SSE frame whose `type` field matches the serde tag below.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Text { delta: String },
    ToolStart { name: String, args: Value },
    ToolEnd { name: String, result: Value },
    PlanGenerated { plan: Value },
    Finding { description: String, data: Value },
    Usage { input_tokens: u32, output_tokens: u32 },
    Error { message: String },
    Done,
    Paused { reason: Option<String> },
}

impl AgentEvent {
    /// Whether this event indicates the stream should stop being read
    /// (spec.md §4.10 step 4: "On `done|paused`, break").
    pub fn ends_stream(&self) -> bool {
        matches!(self, AgentEvent::Done | AgentEvent::Paused { .. })
    }

    pub fn is_tool_start(&self) -> bool {
        matches!(self, AgentEvent::ToolStart { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_and_paused_end_the_stream() {
        assert!(AgentEvent::Done.ends_stream());
        assert!(AgentEvent::Paused { reason: None }.ends_stream());
        assert!(!AgentEvent::Text { delta: "hi".into() }.ends_stream());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = AgentEvent::Text { delta: "hello".to_string() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["delta"], "hello");
    }

    #[test]
    fn tool_start_is_detected() {
        let event = AgentEvent::ToolStart { name: "search".into(), args: Value::Null };
        assert!(event.is_tool_start());
    }
}
