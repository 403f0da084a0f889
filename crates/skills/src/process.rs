//! Spawns a skill handler as a sandboxed subprocess and drives the
//! line-delimited JSON-RPC loop over its stdin/stdout — spec.md §4.8.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use crate::gateway::{PermissionGateway, SkillHost};
use crate::rpc::{FinalResult, RpcRequest, RpcResponse};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Default wall-clock bound on a single handler invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Resource limits applied to the child between fork and exec.
pub const MAX_VM_BYTES: u64 = 256 * 1024 * 1024;
pub const MAX_CPU_SECS: u64 = 30;
pub const MAX_OPEN_FDS: u64 = 64;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler exceeded its {0:?} wall-clock timeout")]
    Timeout(Duration),
    #[error("handler process failed to start: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("handler exited without writing a final result")]
    NoResult,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs one invocation of `handler_path` to completion, brokering any RPC
/// calls it makes through `gateway`/`host`. `args_kwargs` is passed via the
/// `OMNIBRAIN_SKILL_ARGS` environment variable as a JSON string.
pub async fn run_handler(
    handler_path: &Path,
    workspace_root: &Path,
    args_kwargs: &Value,
    gateway: &PermissionGateway,
    host: &dyn SkillHost,
) -> Result<Value, HandlerError> {
    run_handler_with_timeout(handler_path, workspace_root, args_kwargs, gateway, host, DEFAULT_TIMEOUT).await
}

pub async fn run_handler_with_timeout(
    handler_path: &Path,
    workspace_root: &Path,
    args_kwargs: &Value,
    gateway: &PermissionGateway,
    host: &dyn SkillHost,
    handler_timeout: Duration,
) -> Result<Value, HandlerError> {
    let fut = spawn_and_drive(handler_path, workspace_root, args_kwargs, gateway, host);
    match timeout(handler_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(HandlerError::Timeout(handler_timeout)),
    }
}

async fn spawn_and_drive(
    handler_path: &Path,
    workspace_root: &Path,
    args_kwargs: &Value,
    gateway: &PermissionGateway,
    host: &dyn SkillHost,
) -> Result<Value, HandlerError> {
    let mut cmd = Command::new(handler_path);
    cmd.env("OMNIBRAIN_SKILL_ARGS", args_kwargs.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    #[cfg(unix)]
    {
        let workspace = workspace_root.to_string_lossy().to_string();
        // SAFETY: `apply_to_child`/`apply_rlimits` are designed to be called
        // between fork and exec and only make async-signal-safe syscalls.
        unsafe {
            cmd.as_std_mut().pre_exec(move || {
                // SAFETY: called between fork and exec; only async-signal-safe calls.
                unsafe {
                    crate::sandbox::apply_rlimits(MAX_VM_BYTES, MAX_CPU_SECS, MAX_OPEN_FDS);
                    crate::sandbox::apply_to_child(&workspace)
                }
            });
        }
    }

    let mut child = cmd.spawn().map_err(HandlerError::Spawn)?;
    let mut stdin = child.stdin.take().expect("piped stdin");
    let stdout = child.stdout.take().expect("piped stdout");
    let mut lines = BufReader::new(stdout).lines();

    let mut outcome = None;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%err, %line, "skill handler wrote a non-JSON line; ignoring");
                continue;
            }
        };

        if parsed.get("method").is_some() {
            let req: RpcRequest = match serde_json::from_value(parsed) {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(%err, "malformed rpc request from skill handler");
                    continue;
                }
            };
            let resp: RpcResponse = gateway.handle(req, host).await;
            stdin.write_all(resp.to_line().as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        } else if let Ok(final_result) = serde_json::from_value::<FinalResult>(parsed) {
            outcome = Some(final_result.result);
            break;
        }
    }

    drop(stdin);
    let _ = child.wait().await;

    outcome.ok_or(HandlerError::NoResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PermissionGateway;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;

    struct NullHost;

    #[async_trait]
    impl SkillHost for NullHost {
        async fn memory_search(&self, _: Value) -> anyhow::Result<Value> {
            Ok(json!([]))
        }
        async fn memory_store(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn notify(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn propose_action(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn llm_complete(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn get_events(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn get_contacts(&self, _: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
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

    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("handler.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh").unwrap();
        f.write_all(body.as_bytes()).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(0o755);
        }
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn handler_writing_final_result_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), r#"echo '{"result": {"ok": true}}'"#);
        let gateway = PermissionGateway::new(&[]);
        let result = run_handler(&script, tmp.path(), &json!({}), &gateway, &NullHost).await.unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn handler_with_no_output_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "true");
        let gateway = PermissionGateway::new(&[]);
        let result = run_handler(&script, tmp.path(), &json!({}), &gateway, &NullHost).await;
        assert!(matches!(result, Err(HandlerError::NoResult)));
    }

    #[tokio::test]
    async fn handler_exceeding_timeout_is_killed() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "sleep 5");
        let gateway = PermissionGateway::new(&[]);
        let result = run_handler_with_timeout(&script, tmp.path(), &json!({}), &gateway, &NullHost, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(HandlerError::Timeout(_))));
    }
}
