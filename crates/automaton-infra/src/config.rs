//! Process configuration loader for the automation execution core.
//!
//! Reads `config.toml` from a configured directory and deserializes it into
//! [`AutomatonConfig`]. Falls back to [`AutomatonConfig::default()`] when the
//! file is missing or malformed, logging at `debug`/`warn` respectively.

use std::path::{Path, PathBuf};

use automaton_types::config::AutomatonConfig;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AUTOMATON_DATA_DIR` environment variable
/// 2. Platform-specific data directory (e.g., `~/.automaton` on macOS/Linux)
/// 3. `.automaton` under the current directory, as a last resort.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AUTOMATON_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".automaton");
    }

    PathBuf::from(".automaton")
}

/// Load process configuration from `{config_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AutomatonConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config
///   (missing fields fall back to their per-field defaults via serde).
pub async fn load_config(config_dir: &Path) -> AutomatonConfig {
    let config_path = config_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AutomatonConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AutomatonConfig::default();
        }
    };

    match toml::from_str::<AutomatonConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AutomatonConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.max_parallel_tasks, 10);
        assert_eq!(config.default_max_retries, 3);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
max_parallel_tasks = 4
default_max_retries = 5
backup_dir = "/var/automaton/backups"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.max_parallel_tasks, 4);
        assert_eq!(config.default_max_retries, 5);
        assert_eq!(config.backup_dir, "/var/automaton/backups");
        // untouched fields still fall back to their own defaults
        assert_eq!(config.default_task_timeout_secs, 60);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.max_parallel_tasks, 10);
    }

    #[test]
    fn default_data_dir_honors_env_override() {
        // SAFETY: test runs single-threaded w.r.t. this env var within the process;
        // no other test reads or writes AUTOMATON_DATA_DIR.
        unsafe { std::env::set_var("AUTOMATON_DATA_DIR", "/tmp/automaton-test-dir") };
        assert_eq!(default_data_dir(), PathBuf::from("/tmp/automaton-test-dir"));
        unsafe { std::env::remove_var("AUTOMATON_DATA_DIR") };
    }
}
