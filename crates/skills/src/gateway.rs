//! Permission-checked, rate-capped dispatch of skill RPC calls onto the
//! host application — spec.md §4.8.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::permissions::{required_permission, DEFAULT_RATE_CAP, ERR_METHOD_NOT_FOUND, ERR_MISSING_PERMISSION, ERR_RATE_LIMIT};
use crate::rpc::{RpcRequest, RpcResponse};

/// Everything a skill handler can reach, implemented by the daemon that
/// owns the Store, Memory, EventBus, and LLM client. Each method
/// corresponds to exactly one RPC method name in the wire protocol.
#[async_trait]
pub trait SkillHost: Send + Sync {
    async fn memory_search(&self, params: Value) -> anyhow::Result<Value>;
    async fn memory_store(&self, params: Value) -> anyhow::Result<Value>;
    async fn notify(&self, params: Value) -> anyhow::Result<Value>;
    async fn propose_action(&self, params: Value) -> anyhow::Result<Value>;
    async fn llm_complete(&self, params: Value) -> anyhow::Result<Value>;
    async fn get_events(&self, params: Value) -> anyhow::Result<Value>;
    async fn get_contacts(&self, params: Value) -> anyhow::Result<Value>;
    async fn get_preference(&self, params: Value) -> anyhow::Result<Value>;
    async fn emit_event(&self, params: Value) -> anyhow::Result<Value>;
    async fn get_integration(&self, params: Value) -> anyhow::Result<Value>;
    async fn log(&self, params: Value) -> anyhow::Result<Value>;
}

/// Per-invocation gateway state: one instance is created per handler call
/// and discarded afterward, so the rate cap and permission set never leak
/// across invocations.
pub struct PermissionGateway {
    granted: HashSet<String>,
    rate_cap: u32,
    calls_made: AtomicU32,
}

impl PermissionGateway {
    pub fn new(granted_permissions: &[String]) -> Self {
        Self::with_rate_cap(granted_permissions, DEFAULT_RATE_CAP)
    }

    pub fn with_rate_cap(granted_permissions: &[String], rate_cap: u32) -> Self {
        Self {
            granted: granted_permissions.iter().cloned().collect(),
            rate_cap,
            calls_made: AtomicU32::new(0),
        }
    }

    pub async fn handle(&self, req: RpcRequest, host: &dyn SkillHost) -> RpcResponse {
        let permission = match required_permission(&req.method) {
            Err(()) => return RpcResponse::err(req.id, ERR_METHOD_NOT_FOUND, format!("unknown method: {}", req.method)),
            Ok(p) => p,
        };

        let calls_so_far = self.calls_made.fetch_add(1, Ordering::SeqCst) + 1;
        if calls_so_far > self.rate_cap {
            return RpcResponse::err(req.id, ERR_RATE_LIMIT, "per-invocation rate cap exceeded");
        }

        if let Some(perm) = permission {
            if !self.granted.contains(perm) {
                return RpcResponse::err(req.id, ERR_MISSING_PERMISSION, format!("missing permission: {perm}"));
            }
        }

        let result = match req.method.as_str() {
            "memory_search" => host.memory_search(req.params).await,
            "memory_store" => host.memory_store(req.params).await,
            "notify" => host.notify(req.params).await,
            "propose_action" => host.propose_action(req.params).await,
            "llm_complete" => host.llm_complete(req.params).await,
            "get_events" => host.get_events(req.params).await,
            "get_contacts" => host.get_contacts(req.params).await,
            "get_preference" => host.get_preference(req.params).await,
            "emit_event" => host.emit_event(req.params).await,
            "get_integration" => host.get_integration(req.params).await,
            "log" => host.log(req.params).await,
            // Unreachable: required_permission already rejected anything else.
            _ => return RpcResponse::err(req.id, ERR_METHOD_NOT_FOUND, "unknown method"),
        };

        match result {
            Ok(value) => RpcResponse::ok(req.id, value),
            Err(err) => RpcResponse::err(req.id, -32603, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubHost;

    #[async_trait]
    impl SkillHost for StubHost {
        async fn memory_search(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!([]))
        }
        async fn memory_store(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!({"stored": true}))
        }
        async fn notify(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn propose_action(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn llm_complete(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!({"text": "hi"}))
        }
        async fn get_events(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!([]))
        }
        async fn get_contacts(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!([]))
        }
        async fn get_preference(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn emit_event(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn get_integration(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn log(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    fn req(id: i64, method: &str) -> RpcRequest {
        RpcRequest { id: json!(id), method: method.to_string(), params: json!({}) }
    }

    #[tokio::test]
    async fn denies_missing_permission() {
        let gw = PermissionGateway::new(&[]);
        let resp = gw.handle(req(1, "memory_search"), &StubHost).await;
        assert_eq!(resp.error.unwrap().code, ERR_MISSING_PERMISSION);
    }

    #[tokio::test]
    async fn allows_granted_permission() {
        let gw = PermissionGateway::new(&["read_memory".to_string()]);
        let resp = gw.handle(req(1, "memory_search"), &StubHost).await;
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn log_requires_no_permission() {
        let gw = PermissionGateway::new(&[]);
        let resp = gw.handle(req(1, "log"), &StubHost).await;
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_denied() {
        let gw = PermissionGateway::new(&["read_memory".to_string()]);
        let resp = gw.handle(req(1, "delete_everything"), &StubHost).await;
        assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn rate_cap_trips_after_n_calls() {
        let gw = PermissionGateway::with_rate_cap(&["notify".to_string()], 2);
        assert!(gw.handle(req(1, "notify"), &StubHost).await.error.is_none());
        assert!(gw.handle(req(2, "notify"), &StubHost).await.error.is_none());
        let resp = gw.handle(req(3, "notify"), &StubHost).await;
        assert_eq!(resp.error.unwrap().code, ERR_RATE_LIMIT);
    }
}
