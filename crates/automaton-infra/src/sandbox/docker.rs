//! Docker-backed dispatch path.
//!
//! Flags mirror `docker run --rm --read-only --memory=Xm --cpus=Y
//! --pids-limit=50 --network=bridge|none -v ...:/workspace:ro -w /workspace
//! -e KEY=VAL <image> <cmd>`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use automaton_types::execution::{ExecutionLanguage, ExecutionResult, ExecutionStatus, ResourceLimits};
use tokio::process::Command;

use super::{decode_and_truncate, languages, prepare_exec_dir};

pub async fn check_available() -> bool {
    match Command::new("docker")
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

pub async fn run(
    workspace_root: &Path,
    code: &str,
    language: ExecutionLanguage,
    limits: &ResourceLimits,
    files: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> ExecutionResult {
    let spec = languages::spec(language);

    let (exec_dir, _script_path) = match prepare_exec_dir(workspace_root, code, language, files).await {
        Ok(paths) => paths,
        Err(err) => {
            return ExecutionResult {
                status: ExecutionStatus::Failed,
                stdout: String::new(),
                stderr: format!("failed to prepare execution directory: {err}"),
                exit_code: -1,
                duration_ms: 0,
                executor: format!("docker:{}", spec.image),
            }
        }
    };

    let container_script_path = format!("/workspace/script.{}", spec.extension);
    let argv = languages::invocation(language, &container_script_path);

    let mut cmd = Command::new("docker");
    cmd.arg("run")
        .arg("--rm")
        .arg("--read-only")
        .arg(format!("--memory={}m", limits.memory_mb))
        .arg(format!("--cpus={}", limits.cpu_percent as f64 / 100.0))
        .arg("--pids-limit=50")
        .arg(format!("--network={}", if limits.network_enabled { "bridge" } else { "none" }))
        .arg("-v")
        .arg(format!("{}:/workspace:ro", exec_dir.display()))
        .arg("-w")
        .arg("/workspace");

    for (key, value) in env {
        cmd.arg("-e").arg(format!("{key}={value}"));
    }

    cmd.arg(spec.image);
    cmd.args(&argv);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let start = Instant::now();
    let executor_label = format!("docker:{}", spec.image);

    let result = match cmd.spawn() {
        Ok(child) => match tokio::time::timeout(Duration::from_secs(limits.timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => build_result(&output, limits, start.elapsed().as_millis() as u64, &executor_label),
            Ok(Err(err)) => ExecutionResult {
                status: ExecutionStatus::Failed,
                stdout: String::new(),
                stderr: format!("failed to wait for docker process: {err}"),
                exit_code: -1,
                duration_ms: start.elapsed().as_millis() as u64,
                executor: executor_label,
            },
            Err(_elapsed) => ExecutionResult::timeout(limits, executor_label, start.elapsed().as_millis() as u64),
        },
        Err(err) => ExecutionResult {
            status: ExecutionStatus::Failed,
            stdout: String::new(),
            stderr: format!("failed to spawn docker: {err}"),
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
