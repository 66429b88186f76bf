//! Line-delimited-JSON implementation of `automaton_core::permission::AuditSink`.

use std::path::PathBuf;

use automaton_core::permission::audit::{AuditError, BoxFuture};
use automaton_core::permission::AuditSink;
use automaton_types::permission::AuditRecord;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per line to a file, creating parent directories
/// as needed. Writes are serialized through an internal lock so concurrent
/// permission decisions never interleave partial lines.
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Read every record currently on disk, in append order.
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>, AuditError> {
        let _guard = self.lock.lock().await;
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AuditError::WriteFailed(err.to_string())),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| AuditError::WriteFailed(e.to_string())))
            .collect()
    }
}

impl AuditSink for JsonlAuditSink {
    fn write(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), AuditError>> {
        Box::pin(async move {
            let line = serde_json::to_string(&record).map_err(|e| AuditError::WriteFailed(e.to_string()))?;

            let _guard = self.lock.lock().await;

            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AuditError::WriteFailed(e.to_string()))?;
            }

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| AuditError::WriteFailed(e.to_string()))?;

            file.write_all(line.as_bytes())
                .await
                .map_err(|e| AuditError::WriteFailed(e.to_string()))?;
            file.write_all(b"\n").await.map_err(|e| AuditError::WriteFailed(e.to_string()))?;
            file.flush().await.map_err(|e| AuditError::WriteFailed(e.to_string()))?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automaton_types::permission::{ActionKind, PermissionDecision, RiskLevel};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_kind: ActionKind::FileWrite,
            action_params: json!({"path": "/tmp/x"}),
            decision: PermissionDecision::Allow,
            user_approved: None,
            risk_level: RiskLevel::Low,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn write_then_read_all_round_trips() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("nested").join("audit.jsonl"));

        let record = sample_record();
        sink.write(record.clone()).await.unwrap();

        let records = sink.read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record.id);
    }

    #[tokio::test]
    async fn read_all_on_missing_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("missing.jsonl"));
        let records = sink.read_all().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn appends_multiple_records_as_separate_lines() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));

        sink.write(sample_record()).await.unwrap();
        sink.write(sample_record()).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join("audit.jsonl")).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
