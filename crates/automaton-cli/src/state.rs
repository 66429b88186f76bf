//! Application state wiring the workflow engine and its collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use automaton_core::event::bus::EventBus;
use automaton_core::permission::PermissionManager;
use automaton_core::rollback::RollbackManager;
use automaton_core::workflow::engine::WorkflowEngine;
use automaton_infra::audit::JsonlAuditSink;
use automaton_infra::sandbox::SandboxExecutor;
use automaton_types::config::AutomatonConfig;

use crate::executors::{code_exec_executor, file_write_executor, log_executor, noop_executor, StdinPromptCallback};

/// Every service the `run`/`permissions`/`rollback` subcommands need, wired
/// together from a loaded [`AutomatonConfig`].
pub struct AppState {
    pub config: AutomatonConfig,
    pub data_dir: PathBuf,
    pub permissions: Arc<PermissionManager>,
    pub rollback: Arc<RollbackManager>,
    pub sandbox: Arc<SandboxExecutor>,
    pub engine: WorkflowEngine,
}

impl AppState {
    pub async fn init(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = automaton_infra::config::load_config(&data_dir).await;

        let audit_sink = Arc::new(JsonlAuditSink::new(&config.audit_log_path));
        let permissions = Arc::new(
            PermissionManager::new(audit_sink).with_prompt_callback(Arc::new(StdinPromptCallback)),
        );
        let rollback = Arc::new(RollbackManager::new(&config.backup_dir));
        let sandbox = Arc::new(SandboxExecutor::new(&config.sandbox_workspace_root).await);

        let engine = WorkflowEngine::new(EventBus::new(256), config.max_parallel_tasks);
        engine.register_executor("noop", noop_executor());
        engine.register_executor("log", log_executor());
        engine.register_executor("code_exec", code_exec_executor(permissions.clone(), sandbox.clone()));
        engine.register_executor("file_write", file_write_executor(permissions.clone(), rollback.clone()));

        Ok(Self {
            config,
            data_dir,
            permissions,
            rollback,
            sandbox,
            engine,
        })
    }
}
