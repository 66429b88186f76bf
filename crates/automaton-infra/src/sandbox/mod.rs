//! Sandbox Executor: runs untrusted source under resource/isolation limits.
//!
//! Dispatches to a Docker container when the runtime is available
//! ([`docker`]), falling back to a direct subprocess with explicitly weaker
//! isolation guarantees ([`subprocess`]) otherwise. Per-language container
//! image/extension/invocation facts live in [`languages`].

pub mod docker;
pub mod languages;
pub mod subprocess;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use automaton_types::execution::{ExecutionResult, ExecutionStats, ExecutionStatus, ExecutionLanguage, ResourceLimits};
use dashmap::DashMap;
use uuid::Uuid;

/// Truncate a byte buffer to `limit` bytes and decode as UTF-8, replacing
/// invalid sequences. Mirrors the spec's output-capture contract exactly.
pub(crate) fn decode_and_truncate(bytes: &[u8], limit: usize) -> String {
    let truncated = &bytes[..bytes.len().min(limit)];
    String::from_utf8_lossy(truncated).into_owned()
}

/// Create a fresh scratch directory under `workspace_root`, write the script
/// and any auxiliary files into it, and return (exec_dir, script_path).
pub(crate) async fn prepare_exec_dir(
    workspace_root: &Path,
    code: &str,
    language: ExecutionLanguage,
    files: &HashMap<String, String>,
) -> std::io::Result<(PathBuf, PathBuf)> {
    let spec = languages::spec(language);
    let exec_dir = workspace_root.join(Uuid::now_v7().to_string());
    tokio::fs::create_dir_all(&exec_dir).await?;

    let script_path = exec_dir.join(format!("script.{}", spec.extension));
    tokio::fs::write(&script_path, code).await?;

    #[cfg(unix)]
    if spec.executable_script {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    for (name, content) in files {
        tokio::fs::write(exec_dir.join(name), content).await?;
    }

    Ok((exec_dir, script_path))
}

/// Run-count/duration aggregation is kept only to compute [`ExecutionStats`];
/// it is not part of the public contract beyond that aggregate.
pub struct SandboxExecutor {
    workspace_root: PathBuf,
    docker_available: bool,
    counts_by_status: DashMap<ExecutionStatus, u64>,
    total_runs: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl SandboxExecutor {
    /// Probe for Docker and create the workspace root.
    pub async fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let _ = tokio::fs::create_dir_all(&workspace_root).await;
        let docker_available = docker::check_available().await;
        Self::build(workspace_root, docker_available)
    }

    /// Construct with an explicit availability flag, skipping the Docker
    /// probe. Used by tests and by deployments that pin the fallback path.
    pub async fn with_docker_available(workspace_root: impl Into<PathBuf>, docker_available: bool) -> Self {
        let workspace_root = workspace_root.into();
        let _ = tokio::fs::create_dir_all(&workspace_root).await;
        Self::build(workspace_root, docker_available)
    }

    fn build(workspace_root: PathBuf, docker_available: bool) -> Self {
        Self {
            workspace_root,
            docker_available,
            counts_by_status: DashMap::new(),
            total_runs: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }

    pub async fn check_sandbox_available(&self) -> bool {
        self.docker_available
    }

    pub async fn execute(
        &self,
        code: &str,
        language: ExecutionLanguage,
        limits: ResourceLimits,
        files: HashMap<String, String>,
        env: HashMap<String, String>,
    ) -> ExecutionResult {
        let result = if self.docker_available {
            docker::run(&self.workspace_root, code, language, &limits, &files, &env).await
        } else {
            subprocess::run(&self.workspace_root, code, language, &limits, &files, &env).await
        };

        *self.counts_by_status.entry(result.status).or_insert(0) += 1;
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(result.duration_ms, Ordering::Relaxed);

        result
    }

    pub fn execution_stats(&self) -> ExecutionStats {
        let total_runs = self.total_runs.load(Ordering::Relaxed);
        let average_duration_ms = if total_runs == 0 {
            0.0
        } else {
            self.total_duration_ms.load(Ordering::Relaxed) as f64 / total_runs as f64
        };

        ExecutionStats {
            counts_by_status: self.counts_by_status.iter().map(|e| (*e.key(), *e.value())).collect(),
            average_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn subprocess_fallback_executes_shell_script() {
        let dir = TempDir::new().unwrap();
        let executor = SandboxExecutor::with_docker_available(dir.path(), false).await;

        let result = executor
            .execute(
                "echo hello-from-sandbox",
                ExecutionLanguage::Shell,
                ResourceLimits::default(),
                HashMap::new(),
                HashMap::new(),
            )
            .await;

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert!(result.stdout.contains("hello-from-sandbox"));
        assert!(result.executor.contains("subprocess"));
    }

    #[tokio::test]
    async fn stats_aggregate_after_executions() {
        let dir = TempDir::new().unwrap();
        let executor = SandboxExecutor::with_docker_available(dir.path(), false).await;

        executor
            .execute("echo one", ExecutionLanguage::Shell, ResourceLimits::default(), HashMap::new(), HashMap::new())
            .await;
        executor
            .execute("echo two", ExecutionLanguage::Shell, ResourceLimits::default(), HashMap::new(), HashMap::new())
            .await;

        let stats = executor.execution_stats();
        assert_eq!(stats.counts_by_status.get(&ExecutionStatus::Completed), Some(&2));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_failed() {
        let dir = TempDir::new().unwrap();
        let executor = SandboxExecutor::with_docker_available(dir.path(), false).await;

        let result = executor
            .execute("exit 3", ExecutionLanguage::Shell, ResourceLimits::default(), HashMap::new(), HashMap::new())
            .await;

        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn timeout_produces_timeout_status_with_empty_stdout() {
        let dir = TempDir::new().unwrap();
        let executor = SandboxExecutor::with_docker_available(dir.path(), false).await;

        let limits = ResourceLimits {
            timeout_secs: 1,
            ..ResourceLimits::default()
        };

        let result = executor
            .execute("sleep 5", ExecutionLanguage::Shell, limits, HashMap::new(), HashMap::new())
            .await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.stdout.is_empty());
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn decode_and_truncate_replaces_invalid_utf8_and_truncates() {
        let bytes = [b'h', b'i', 0xff, b'!'];
        let decoded = decode_and_truncate(&bytes, 2);
        assert_eq!(decoded, "hi");
    }
}
