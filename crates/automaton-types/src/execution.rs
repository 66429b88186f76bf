//! Sandbox execution result and resource-limit types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Languages the sandbox executor knows how to run.
///
/// Each maps to a `(container_image, extension, invocation_template)` entry
/// in `automaton-infra::sandbox::languages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionLanguage {
    /// General-purpose scripting language (Python).
    Python,
    /// Embedded scripting language (Lua).
    Lua,
    /// POSIX shell.
    Shell,
    /// Compiled systems language (Rust).
    Rust,
    /// Compiled systems language (Go).
    Go,
}

/// Terminal and non-terminal states of a sandboxed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Killed,
}

/// Resource and isolation bounds enforced on a sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory ceiling, in megabytes.
    pub memory_mb: u32,
    /// CPU share as a percentage of one core (100 = one full core).
    pub cpu_percent: u32,
    /// Wall-clock timeout, in seconds.
    pub timeout_secs: u64,
    /// Per-stream (stdout/stderr) output byte ceiling.
    pub max_output_bytes: usize,
    /// Whether the container/process may reach the network.
    pub network_enabled: bool,
    /// Domains permitted when `network_enabled` is true. Empty means
    /// "any", interpreted by the collaborator enforcing DNS/firewall rules;
    /// the sandbox executor itself only toggles network on/off.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpu_percent: 50,
            timeout_secs: 60,
            max_output_bytes: 1_048_576,
            network_enabled: false,
            allowed_domains: Vec::new(),
        }
    }
}

/// Outcome of one sandboxed (or subprocess-fallback) execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Captured stdout, UTF-8 with invalid sequences replaced, truncated to
    /// `ResourceLimits::max_output_bytes`.
    pub stdout: String,
    /// Captured stderr, same truncation rule as `stdout`.
    pub stderr: String,
    /// Process exit code; `-1` when the process was killed (timeout or
    /// cancellation).
    pub exit_code: i32,
    /// Wall-clock execution duration, in milliseconds.
    pub duration_ms: u64,
    /// Human-readable descriptor of what actually ran it, e.g.
    /// `"docker:python:3.12-slim"` or `"subprocess:python3 (fallback)"`.
    pub executor: String,
}

impl ExecutionResult {
    /// Build a `Timeout` result with empty stdout, as required by the
    /// sandbox's timeout-enforcement contract.
    pub fn timeout(limit: &ResourceLimits, executor: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            stdout: String::new(),
            stderr: format!("execution exceeded timeout of {} seconds", limit.timeout_secs),
            exit_code: -1,
            duration_ms,
            executor: executor.into(),
        }
    }
}

/// Aggregate execution statistics exposed by the sandbox executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Count of executions ending in each terminal status.
    pub counts_by_status: HashMap<ExecutionStatus, u64>,
    /// Running average wall-clock duration across all executions, in
    /// milliseconds.
    pub average_duration_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_limits_default_is_network_disabled() {
        let limits = ResourceLimits::default();
        assert!(!limits.network_enabled);
        assert!(limits.allowed_domains.is_empty());
    }

    #[test]
    fn timeout_result_has_negative_one_exit_code_and_empty_stdout() {
        let limits = ResourceLimits {
            timeout_secs: 5,
            ..ResourceLimits::default()
        };
        let result = ExecutionResult::timeout(&limits, "docker:python:3.12-slim", 5000);
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.exit_code, -1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains('5'));
    }

    #[test]
    fn execution_result_serde_roundtrip() {
        let result = ExecutionResult {
            status: ExecutionStatus::Completed,
            stdout: "hi".to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 12,
            executor: "docker:python:3.12-slim".to_string(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let restored: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.stdout, "hi");
        assert_eq!(restored.exit_code, 0);
    }
}
