//! Built-in example `TaskExecutor`s wired together for the `run` subcommand.
//!
//! Per the CLI surface's contract, this is a small demonstration set, not a
//! full backend library: `noop`/`log` exercise the engine alone, `code_exec`
//! exercises the Sandbox Executor behind a permission check, and
//! `file_write` exercises the Rollback Manager behind a permission check.
//! Actions outside this set (mouse/keyboard/browser/network) have no local
//! backend in this crate's dependency stack and are left for a caller to
//! register its own executor under that action name.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use automaton_core::permission::audit::BoxFuture;
use automaton_core::permission::{PermissionManager, PromptCallback};
use automaton_core::rollback::{with_rollback, RollbackManager};
use automaton_core::workflow::engine::{FnExecutor, TaskExecutor};
use automaton_infra::sandbox::SandboxExecutor;
use automaton_types::execution::{ExecutionLanguage, ResourceLimits};
use automaton_types::permission::{ActionKind, RiskLevel};
use serde_json::Value;

/// Map a workflow task's free-form `action` string onto the permission
/// taxonomy. Unrecognized actions are gated as `Other` rather than
/// ungated, so an unknown action still goes through a risk-based default
/// decision instead of silently bypassing the permission manager.
pub fn action_kind_for(action: &str) -> ActionKind {
    match action {
        "mouse_event" => ActionKind::MouseEvent,
        "keyboard_event" => ActionKind::KeyboardEvent,
        "window_op" => ActionKind::WindowOp,
        "browser_navigate" => ActionKind::BrowserNavigate,
        "browser_form_fill" => ActionKind::BrowserFormFill,
        "file_read" => ActionKind::FileRead,
        "file_write" => ActionKind::FileWrite,
        "file_delete" => ActionKind::FileDelete,
        "code_exec" => ActionKind::CodeExecution,
        "network_request" => ActionKind::NetworkRequest,
        other => ActionKind::Other { label: other.to_string() },
    }
}

/// Always returns the input params unchanged. Useful for wiring a workflow
/// file together without touching any real system.
pub fn noop_executor() -> Arc<dyn TaskExecutor> {
    Arc::new(FnExecutor(|params: HashMap<String, Value>| async move { Ok(Value::Object(params.into_iter().collect())) }))
}

/// Logs its params at `info` and returns them unchanged.
pub fn log_executor() -> Arc<dyn TaskExecutor> {
    Arc::new(FnExecutor(|params: HashMap<String, Value>| async move {
        tracing::info!(?params, "workflow log task");
        Ok(Value::Object(params.into_iter().collect()))
    }))
}

/// Permission-gated code execution through the Sandbox Executor.
///
/// Expected params: `code` (string), `language` (one of
/// `python`/`lua`/`shell`/`rust`/`go`, default `python`).
pub fn code_exec_executor(permissions: Arc<PermissionManager>, sandbox: Arc<SandboxExecutor>) -> Arc<dyn TaskExecutor> {
    Arc::new(FnExecutor(move |params: HashMap<String, Value>| {
        let permissions = permissions.clone();
        let sandbox = sandbox.clone();
        async move {
            let code = params.get("code").and_then(Value::as_str).unwrap_or("").to_string();
            let language = parse_language(params.get("language").and_then(Value::as_str));

            let action_params = Value::Object(params.clone().into_iter().collect());
            let allowed = permissions
                .check_permission(ActionKind::CodeExecution, action_params, HashMap::new())
                .await
                .map_err(|e| e.to_string())?;

            if !allowed {
                return Err("permission denied for code_exec".to_string());
            }

            let result = sandbox
                .execute(&code, language, ResourceLimits::default(), HashMap::new(), HashMap::new())
                .await;

            serde_json::to_value(result).map_err(|e| e.to_string())
        }
    }))
}

/// Permission-gated, rollback-protected file write.
///
/// Expected params: `path` (string), `content` (string).
pub fn file_write_executor(permissions: Arc<PermissionManager>, rollback: Arc<RollbackManager>) -> Arc<dyn TaskExecutor> {
    Arc::new(FnExecutor(move |params: HashMap<String, Value>| {
        let permissions = permissions.clone();
        let rollback = rollback.clone();
        async move {
            let path = params.get("path").and_then(Value::as_str).unwrap_or("").to_string();
            let content = params.get("content").and_then(Value::as_str).unwrap_or("").to_string();

            let action_params = Value::Object(params.clone().into_iter().collect());
            let allowed = permissions
                .check_permission(ActionKind::FileWrite, action_params, HashMap::new())
                .await
                .map_err(|e| e.to_string())?;

            if !allowed {
                return Err(format!("permission denied for file_write on '{path}'"));
            }

            let path_buf = PathBuf::from(&path);
            let existed = tokio::fs::try_exists(&path_buf).await.unwrap_or(false);

            with_rollback(&rollback, format!("file_write:{path}"), || async {
                if existed {
                    rollback.capture_file_modify(&path_buf).await.map_err(|e| e.to_string())?;
                } else {
                    rollback.capture_file_create(&path_buf).await.map_err(|e| e.to_string())?;
                }
                tokio::fs::write(&path_buf, &content).await.map_err(|e| e.to_string())
            })
            .await?;

            Ok(serde_json::json!({"path": path, "bytes_written": content.len()}))
        }
    }))
}

fn parse_language(value: Option<&str>) -> ExecutionLanguage {
    match value {
        Some("lua") => ExecutionLanguage::Lua,
        Some("shell") | Some("sh") => ExecutionLanguage::Shell,
        Some("rust") => ExecutionLanguage::Rust,
        Some("go") => ExecutionLanguage::Go,
        _ => ExecutionLanguage::Python,
    }
}

/// Interactive prompt callback: asks on stdin/stdout, blocking a dedicated
/// thread so it never stalls the async runtime.
pub struct StdinPromptCallback;

impl PromptCallback for StdinPromptCallback {
    fn prompt(&self, action_kind: ActionKind, params: Value, risk: RiskLevel) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let question = format!("Allow {action_kind:?} (risk: {risk:?}) with params {params}? [y/N] ");
            tokio::task::spawn_blocking(move || {
                print!("{question}");
                let _ = std::io::stdout().flush();
                let mut line = String::new();
                if std::io::stdin().read_line(&mut line).is_err() {
                    return false;
                }
                matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
            })
            .await
            .unwrap_or(false)
        })
    }
}
