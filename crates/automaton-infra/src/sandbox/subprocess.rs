//! Subprocess fallback path, used when the Docker runtime is unavailable.
//!
//! Same timeout and output-capture semantics as [`super::docker`], but runs
//! directly on the host: no filesystem read-only bind, no memory/CPU/PID
//! caps, and the child inherits the host environment (only `env_vars` are
//! added on top). The result's `executor` descriptor always names this path
//! so callers can tell the isolation level apart from the log alone.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use automaton_types::execution::{ExecutionLanguage, ExecutionResult, ExecutionStatus, ResourceLimits};
use tokio::process::Command;

use super::{decode_and_truncate, languages, prepare_exec_dir};

pub async fn run(
    workspace_root: &Path,
    code: &str,
    language: ExecutionLanguage,
    limits: &ResourceLimits,
    files: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> ExecutionResult {
    let spec = languages::spec(language);
    let executor_label = format!("subprocess:{} (fallback)", spec.image);

    let (exec_dir, script_path) = match prepare_exec_dir(workspace_root, code, language, files).await {
        Ok(paths) => paths,
        Err(err) => {
            return ExecutionResult {
                status: ExecutionStatus::Failed,
                stdout: String::new(),
                stderr: format!("failed to prepare execution directory: {err}"),
                exit_code: -1,
                duration_ms: 0,
                executor: executor_label,
            }
        }
    };

    let argv = languages::invocation(language, &script_path.to_string_lossy());

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd.current_dir(&exec_dir);
    cmd.envs(env);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let start = Instant::now();

    let result = match cmd.spawn() {
        Ok(child) => match tokio::time::timeout(Duration::from_secs(limits.timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => build_result(&output, limits, start.elapsed().as_millis() as u64, &executor_label),
            Ok(Err(err)) => ExecutionResult {
                status: ExecutionStatus::Failed,
                stdout: String::new(),
                stderr: format!("failed to wait for subprocess: {err}"),
                exit_code: -1,
                duration_ms: start.elapsed().as_millis() as u64,
                executor: executor_label,
            },
            Err(_elapsed) => ExecutionResult::timeout(limits, executor_label, start.elapsed().as_millis() as u64),
        },
        Err(err) => ExecutionResult {
            status: ExecutionStatus::Failed,
            stdout: String::new(),
            stderr: format!("failed to spawn '{}': {err}", argv[0]),
            exit_code: -1,
            duration_ms: start.elapsed().as_millis() as u64,
            executor: executor_label,
        },
    };

    let _ = tokio::fs::remove_dir_all(&exec_dir).await;
    result
}

fn build_result(output: &std::process::Output, limits: &ResourceLimits, duration_ms: u64, executor: &str) -> ExecutionResult {
    let stdout = decode_and_truncate(&output.stdout, limits.max_output_bytes);
    let stderr = decode_and_truncate(&output.stderr, limits.max_output_bytes);
    let status = if output.status.success() {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Failed
    };

    ExecutionResult {
        status,
        stdout,
        stderr,
        exit_code: output.status.code().unwrap_or(-1),
        duration_ms,
        executor: executor.to_string(),
    }
}
