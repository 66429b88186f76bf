//! Transaction lifecycle, capture operations, and LIFO restore.
//!
//! Grounded in `original_source/.../rollback.py`'s `RollbackManager`: the
//! single-current-transaction pointer, per-operation capture methods that
//! append a rollback point, and the reverse-order inverse walk on rollback.
//! File operations go through `tokio::fs` directly (no sandbox/subprocess
//! boundary -- this is local-disk bookkeeping, not process execution).

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use automaton_types::rollback::{RollbackActionType, RollbackPoint, Transaction};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("no active transaction")]
    NoActiveTransaction,

    #[error("transaction '{0}' not found")]
    TransactionNotFound(Uuid),

    #[error("transaction '{0}' was already rolled back")]
    AlreadyRolledBack(Uuid),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate counts exposed alongside the transaction log.
#[derive(Debug, Clone, Default)]
pub struct RollbackStats {
    pub total_transactions: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub active: u64,
    pub total_rollback_points: u64,
    pub by_action_type: std::collections::HashMap<String, u64>,
}

/// Transactional undo log. Captures pre-mutation state as rollback points
/// inside a transaction; on rollback, restores it in strict LIFO order.
pub struct RollbackManager {
    backup_dir: PathBuf,
    transactions: DashMap<Uuid, Transaction>,
    current: RwLock<Option<Uuid>>,
}

impl RollbackManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            transactions: DashMap::new(),
            current: RwLock::new(None),
        }
    }

    /// Start a new transaction and make it current. Older open transactions
    /// remain addressable by id but are no longer the capture target.
    pub fn begin(&self, name: impl Into<String>) -> Uuid {
        let tx = Transaction::new(name);
        let id = tx.id;
        self.transactions.insert(id, tx);
        *self.current.write().unwrap() = Some(id);
        id
    }

    /// Mark a transaction committed. Idempotent.
    pub fn commit(&self, tx_id: Uuid) -> Result<(), RollbackError> {
        let mut tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(RollbackError::TransactionNotFound(tx_id))?;
        tx.committed = true;
        drop(tx);

        let mut current = self.current.write().unwrap();
        if *current == Some(tx_id) {
            *current = None;
        }
        Ok(())
    }

    /// Reverse every rollback point in `tx_id`, most recent first. Failures
    /// inverting one point are logged and do not stop the remaining points.
    pub async fn rollback(&self, tx_id: Uuid) -> Result<(), RollbackError> {
        let points = {
            let tx = self
                .transactions
                .get(&tx_id)
                .ok_or(RollbackError::TransactionNotFound(tx_id))?;
            if tx.rolled_back {
                return Err(RollbackError::AlreadyRolledBack(tx_id));
            }
            tx.points.clone()
        };

        for point in points.iter().rev() {
            if !point.can_rollback {
                continue;
            }
            if let Err(e) = execute_inverse(point).await {
                tracing::error!(point_id = %point.id, error = %e, "rollback inverse failed, continuing");
            }
        }

        let mut tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(RollbackError::TransactionNotFound(tx_id))?;
        tx.rolled_back = true;
        drop(tx);

        let mut current = self.current.write().unwrap();
        if *current == Some(tx_id) {
            *current = None;
        }
        Ok(())
    }

    fn current_tx_id(&self) -> Result<Uuid, RollbackError> {
        self.current.read().unwrap().ok_or(RollbackError::NoActiveTransaction)
    }

    fn append_point(&self, tx_id: Uuid, point: RollbackPoint) -> Uuid {
        let id = point.id;
        if let Some(mut tx) = self.transactions.get_mut(&tx_id) {
            tx.points.push(point);
        }
        id
    }

    pub async fn capture_file_create(&self, path: &Path) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::FileCreate,
            original_state: json!({"path": path.to_string_lossy()}),
            can_rollback: true,
        };
        Ok(self.append_point(tx_id, point))
    }

    pub async fn capture_file_modify(&self, path: &Path) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let (can_rollback, backup_path, content_hash) = match tokio::fs::read(path).await {
            Ok(content) => {
                let backup_path = self.unique_backup_path(path);
                tokio::fs::copy(path, &backup_path).await?;
                let hash = hex_sha256(&content);
                (true, Some(backup_path), Some(hash))
            }
            Err(_) => (false, None, None),
        };

        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::FileModify,
            original_state: json!({
                "path": path.to_string_lossy(),
                "backup_path": backup_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                "content_hash": content_hash,
            }),
            can_rollback,
        };
        Ok(self.append_point(tx_id, point))
    }

    pub async fn capture_file_delete(&self, path: &Path) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let (can_rollback, backup_path) = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let backup_path = self.unique_backup_path(path);
            tokio::fs::copy(path, &backup_path).await?;
            (true, Some(backup_path))
        } else {
            (false, None)
        };

        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::FileDelete,
            original_state: json!({
                "path": path.to_string_lossy(),
                "backup_path": backup_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            }),
            can_rollback,
        };
        Ok(self.append_point(tx_id, point))
    }

    pub async fn capture_file_move(&self, src: &Path, dst: &Path) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let can_rollback = tokio::fs::try_exists(src).await.unwrap_or(false);
        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::FileMove,
            original_state: json!({
                "src": src.to_string_lossy(),
                "dst": dst.to_string_lossy(),
            }),
            can_rollback,
        };
        Ok(self.append_point(tx_id, point))
    }

    /// `content` is the clipboard text at capture time, read by the caller
    /// (this crate has no OS clipboard integration).
    pub async fn capture_clipboard(&self, content: Option<String>) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let can_rollback = content.is_some();
        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::ClipboardChange,
            original_state: json!({"content": content}),
            can_rollback,
        };
        Ok(self.append_point(tx_id, point))
    }

    pub async fn capture_window_state(
        &self,
        window_id: impl Into<String>,
        state: Value,
    ) -> Result<Uuid, RollbackError> {
        let tx_id = self.current_tx_id()?;
        let point = RollbackPoint {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_type: RollbackActionType::WindowOp,
            original_state: json!({"window_id": window_id.into(), "state": state}),
            can_rollback: true,
        };
        Ok(self.append_point(tx_id, point))
    }

    pub fn get_transaction(&self, tx_id: Uuid) -> Option<Transaction> {
        self.transactions.get(&tx_id).map(|t| t.clone())
    }

    pub fn list_transactions(&self, committed: Option<bool>) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .map(|e| e.value().clone())
            .filter(|t| committed.is_none_or(|c| t.committed == c))
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs
    }

    /// Delete backup files older than `max_age`. Returns the number removed.
    pub async fn cleanup_old_backups(&self, max_age: Duration) -> Result<u64, RollbackError> {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0u64;

        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = metadata.modified()?.into();
            if modified < cutoff {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    pub fn get_statistics(&self) -> RollbackStats {
        let mut stats = RollbackStats::default();
        for entry in self.transactions.iter() {
            let tx = entry.value();
            stats.total_transactions += 1;
            if tx.committed {
                stats.committed += 1;
            }
            if tx.rolled_back {
                stats.rolled_back += 1;
            }
            stats.total_rollback_points += tx.points.len() as u64;
            for point in &tx.points {
                *stats.by_action_type.entry(action_type_label(point.action_type)).or_insert(0) += 1;
            }
        }
        stats.active = stats.total_transactions - stats.committed - stats.rolled_back;
        stats
    }

    fn unique_backup_path(&self, original: &Path) -> PathBuf {
        let file_name = original.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        self.backup_dir.join(format!("{}_{}", Uuid::now_v7(), file_name))
    }
}

async fn execute_inverse(point: &RollbackPoint) -> Result<(), RollbackError> {
    match point.action_type {
        RollbackActionType::FileCreate => {
            let path = path_field(&point.original_state, "path");
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tokio::fs::remove_file(&path).await?;
            }
        }
        RollbackActionType::FileModify | RollbackActionType::FileDelete => {
            let target = path_field(&point.original_state, "path");
            if let Some(backup) = point.original_state.get("backup_path").and_then(Value::as_str) {
                if tokio::fs::try_exists(backup).await.unwrap_or(false) {
                    tokio::fs::copy(backup, &target).await?;
                }
            }
        }
        RollbackActionType::FileMove => {
            let src = path_field(&point.original_state, "src");
            let dst = path_field(&point.original_state, "dst");
            if tokio::fs::try_exists(&dst).await.unwrap_or(false) {
                tokio::fs::rename(&dst, &src).await?;
            }
        }
        RollbackActionType::ClipboardChange => {
            // No OS clipboard integration at this layer; the captured
            // content is bookkeeping only (see rollback point's
            // `original_state`). An infra adapter owning the real clipboard
            // would perform the write.
        }
        RollbackActionType::WindowOp => {
            // Inverse intentionally a no-op; no window manager integration
            // is in scope here. The point still participates in LIFO
            // ordering and `can_rollback` bookkeeping.
        }
    }
    Ok(())
}

fn path_field(state: &Value, key: &str) -> String {
    state.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn action_type_label(action_type: RollbackActionType) -> String {
    match action_type {
        RollbackActionType::FileCreate => "file_create",
        RollbackActionType::FileModify => "file_modify",
        RollbackActionType::FileDelete => "file_delete",
        RollbackActionType::FileMove => "file_move",
        RollbackActionType::ClipboardChange => "clipboard_change",
        RollbackActionType::WindowOp => "window_op",
    }
    .to_string()
}

fn hex_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Open a transaction, run `operation`, commit on success, roll back on any
/// error it returns.
pub async fn with_rollback<F, Fut, T, E>(manager: &RollbackManager, name: impl Into<String>, operation: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let tx_id = manager.begin(name);
    match operation().await {
        Ok(value) => {
            let _ = manager.commit(tx_id);
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = manager.rollback(tx_id).await {
                tracing::error!(%rollback_err, "rollback failed after operation error");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> RollbackManager {
        RollbackManager::new(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn capture_without_active_transaction_errors() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let err = mgr.capture_file_create(Path::new("/tmp/x")).await.unwrap_err();
        assert!(matches!(err, RollbackError::NoActiveTransaction));
    }

    #[tokio::test]
    async fn modify_then_rollback_restores_original_content() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let file_path = dir.path().join("target.txt");
        tokio::fs::write(&file_path, b"original").await.unwrap();

        let tx = mgr.begin("edit");
        mgr.capture_file_modify(&file_path).await.unwrap();
        tokio::fs::write(&file_path, b"changed").await.unwrap();

        mgr.rollback(tx).await.unwrap();
        let restored = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert_eq!(restored, "original");
    }

    #[tokio::test]
    async fn delete_then_rollback_restores_file() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let file_path = dir.path().join("gone.txt");
        tokio::fs::write(&file_path, b"keep me").await.unwrap();

        let tx = mgr.begin("delete");
        mgr.capture_file_delete(&file_path).await.unwrap();
        tokio::fs::remove_file(&file_path).await.unwrap();

        mgr.rollback(tx).await.unwrap();
        assert!(tokio::fs::try_exists(&file_path).await.unwrap());
    }

    #[tokio::test]
    async fn create_then_rollback_deletes_file() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let file_path = dir.path().join("new.txt");

        let tx = mgr.begin("create");
        mgr.capture_file_create(&file_path).await.unwrap();
        tokio::fs::write(&file_path, b"brand new").await.unwrap();

        mgr.rollback(tx).await.unwrap();
        assert!(!tokio::fs::try_exists(&file_path).await.unwrap());
    }

    #[tokio::test]
    async fn rollback_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let tx = mgr.begin("noop");
        mgr.rollback(tx).await.unwrap();
        let err = mgr.rollback(tx).await.unwrap_err();
        assert!(matches!(err, RollbackError::AlreadyRolledBack(_)));
    }

    #[tokio::test]
    async fn commit_clears_current_transaction_pointer() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let tx = mgr.begin("t1");
        mgr.commit(tx).unwrap();
        let err = mgr.capture_file_create(Path::new("/tmp/x")).await.unwrap_err();
        assert!(matches!(err, RollbackError::NoActiveTransaction));
    }

    #[tokio::test]
    async fn multiple_points_roll_back_in_lifo_order() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, b"a-original").await.unwrap();
        tokio::fs::write(&b, b"b-original").await.unwrap();

        let tx = mgr.begin("batch");
        mgr.capture_file_modify(&a).await.unwrap();
        tokio::fs::write(&a, b"a-changed").await.unwrap();
        mgr.capture_file_modify(&b).await.unwrap();
        tokio::fs::write(&b, b"b-changed").await.unwrap();

        mgr.rollback(tx).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&a).await.unwrap(), "a-original");
        assert_eq!(tokio::fs::read_to_string(&b).await.unwrap(), "b-original");
    }

    #[tokio::test]
    async fn uncapturable_point_does_not_abort_remaining_rollback() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let missing = dir.path().join("never-existed.txt");
        let present = dir.path().join("present.txt");
        tokio::fs::write(&present, b"original").await.unwrap();

        let tx = mgr.begin("mixed");
        mgr.capture_file_modify(&missing).await.unwrap(); // can_rollback = false
        mgr.capture_file_modify(&present).await.unwrap();
        tokio::fs::write(&present, b"changed").await.unwrap();

        mgr.rollback(tx).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&present).await.unwrap(), "original");
    }

    #[tokio::test]
    async fn with_rollback_commits_on_success() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let result: Result<i32, RollbackError> = with_rollback(&mgr, "op", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        let stats = mgr.get_statistics();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.rolled_back, 0);
    }

    #[tokio::test]
    async fn with_rollback_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let file_path = dir.path().join("target.txt");
        tokio::fs::write(&file_path, b"original").await.unwrap();

        let result: Result<(), String> = with_rollback(&mgr, "op", || async {
            mgr.capture_file_modify(&file_path).await.unwrap();
            tokio::fs::write(&file_path, b"changed").await.unwrap();
            Err("operation failed".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(tokio::fs::read_to_string(&file_path).await.unwrap(), "original");
        let stats = mgr.get_statistics();
        assert_eq!(stats.rolled_back, 1);
    }

    #[tokio::test]
    async fn cleanup_old_backups_removes_only_stale_files() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        tokio::fs::write(dir.path().join("fresh.bak"), b"x").await.unwrap();

        let removed = mgr.cleanup_old_backups(Duration::days(30)).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn statistics_report_zero_for_empty_manager() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let stats = mgr.get_statistics();
        assert_eq!(stats.total_transactions, 0);
    }
}
