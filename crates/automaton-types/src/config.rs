//! Process configuration for the automation execution core.
//!
//! `AutomatonConfig` represents the top-level `config.toml` loaded by
//! `automaton-infra::config::load_config`. All fields have sensible
//! defaults so a missing or partial file still produces a usable config.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the automation execution core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatonConfig {
    /// Bound on concurrently-dispatched tasks per layer.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    /// Default per-task retry budget when a workflow file omits it.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Default per-attempt task timeout, in seconds, when a workflow file
    /// omits it.
    #[serde(default = "default_task_timeout_secs")]
    pub default_task_timeout_secs: u64,
    /// Scratch-directory root for sandboxed executions.
    #[serde(default = "default_sandbox_workspace_root")]
    pub sandbox_workspace_root: String,
    /// Directory backup files are written under.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Path to the line-delimited-JSON audit log.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,
    /// Backups older than this many days are eligible for deletion by the
    /// retention routine.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,
}

fn default_max_parallel_tasks() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_task_timeout_secs() -> u64 {
    60
}

fn default_sandbox_workspace_root() -> String {
    "/tmp/automaton/sandbox".to_string()
}

fn default_backup_dir() -> String {
    "/tmp/automaton/backups".to_string()
}

fn default_audit_log_path() -> String {
    "/tmp/automaton/audit.jsonl".to_string()
}

fn default_backup_retention_days() -> u32 {
    30
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            default_max_retries: default_max_retries(),
            default_task_timeout_secs: default_task_timeout_secs(),
            sandbox_workspace_root: default_sandbox_workspace_root(),
            backup_dir: default_backup_dir(),
            audit_log_path: default_audit_log_path(),
            backup_retention_days: default_backup_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = AutomatonConfig::default();
        assert_eq!(config.max_parallel_tasks, 10);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.default_task_timeout_secs, 60);
    }

    #[test]
    fn deserialize_with_partial_overrides_fills_in_defaults() {
        let toml_str = "max_parallel_tasks = 4\n";
        let config: AutomatonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_parallel_tasks, 4);
        assert_eq!(config.default_max_retries, 3);
    }

    #[test]
    fn serde_roundtrip() {
        let config = AutomatonConfig {
            max_parallel_tasks: 20,
            ..AutomatonConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: AutomatonConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.max_parallel_tasks, 20);
    }
}
