//! Line-delimited JSON-RPC 2.0 wire types exchanged between the runtime
//! and a sandboxed skill-handler child process — spec.md §4.8.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(RpcError { code, message: message.into() }) }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"id":null,"error":{"code":-32603,"message":"internal error serializing response"}}"#.to_string()
        })
    }
}

/// Final value a handler invocation produces — the child writes exactly one
/// `{"result": ...}` line to stdout and exits 0.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalResult {
    pub result: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line() {
        let line = r#"{"id":1,"method":"log","params":{"msg":"hi"}}"#;
        let req: RpcRequest = serde_json::from_str(line).unwrap();
        assert_eq!(req.method, "log");
        assert_eq!(req.params["msg"], "hi");
    }

    #[test]
    fn response_omits_absent_fields() {
        let resp = RpcResponse::ok(Value::from(1), serde_json::json!({"ok": true}));
        let line = resp.to_line();
        assert!(!line.contains("error"));
    }

    #[test]
    fn error_response_carries_code() {
        let resp = RpcResponse::err(Value::from(1), -32001, "missing permission: read_memory");
        let line = resp.to_line();
        assert!(line.contains("-32001"));
    }
}
