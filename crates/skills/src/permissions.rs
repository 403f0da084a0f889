//! RPC method → permission mapping and the JSON-RPC error codes the
//! permission gateway returns — spec.md §4.8.

/// JSON-RPC error: the skill's manifest does not declare the permission
/// this method requires.
pub const ERR_MISSING_PERMISSION: i64 = -32001;
/// JSON-RPC error: the skill has exceeded its per-invocation call budget.
pub const ERR_RATE_LIMIT: i64 = -32000;
/// JSON-RPC error: the method name isn't one of the gateway's known calls.
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;

pub const DEFAULT_RATE_CAP: u32 = 100;

/// Returns the permission required by `method`, or `None` if the method
/// requires no permission (e.g. `log`). Returns `Err(())` for unknown
/// methods so callers can distinguish "no permission needed" from
/// "not a real method".
pub fn required_permission(method: &str) -> Result<Option<&'static str>, ()> {
    match method {
        "memory_search" => Ok(Some("read_memory")),
        "memory_store" => Ok(Some("write_memory")),
        "notify" => Ok(Some("notify")),
        "propose_action" => Ok(Some("propose_actions")),
        "llm_complete" => Ok(Some("llm_access")),
        "get_events" => Ok(Some("read_events")),
        "get_contacts" => Ok(Some("read_contacts")),
        "get_preference" => Ok(Some("read_preferences")),
        "emit_event" => Ok(Some("emit_events")),
        "get_integration" => Ok(Some("integrations")),
        "log" => Ok(None),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_documented_method() {
        assert_eq!(required_permission("memory_search").unwrap(), Some("read_memory"));
        assert_eq!(required_permission("memory_store").unwrap(), Some("write_memory"));
        assert_eq!(required_permission("notify").unwrap(), Some("notify"));
        assert_eq!(required_permission("propose_action").unwrap(), Some("propose_actions"));
        assert_eq!(required_permission("llm_complete").unwrap(), Some("llm_access"));
        assert_eq!(required_permission("get_events").unwrap(), Some("read_events"));
        assert_eq!(required_permission("get_contacts").unwrap(), Some("read_contacts"));
        assert_eq!(required_permission("get_preference").unwrap(), Some("read_preferences"));
        assert_eq!(required_permission("emit_event").unwrap(), Some("emit_events"));
    }

    #[test]
    fn log_requires_no_permission() {
        assert_eq!(required_permission("log").unwrap(), None);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(required_permission("delete_everything").is_err());
    }
}
