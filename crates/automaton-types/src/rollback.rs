//! Rollback manager types: rollback points and transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of mutating action a rollback point can reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackActionType {
    FileCreate,
    FileModify,
    FileDelete,
    FileMove,
    ClipboardChange,
    WindowOp,
}

/// Captured pre-mutation state plus enough information to reverse it.
///
/// `original_state` is a free-form bag whose shape depends on
/// `action_type` (see the capture-operation table in the rollback manager's
/// module documentation): a backup file path and content hash for
/// content-bearing ops, source/destination paths for moves, captured
/// clipboard text, or captured window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action_type: RollbackActionType,
    pub original_state: Value,
    /// `false` when the pre-state could not be captured; the point is
    /// still recorded (for ordering/audit purposes) but its inverse is a
    /// no-op on rollback.
    pub can_rollback: bool,
}

/// An ordered sequence of rollback points with commit/rollback terminal
/// states. Exactly one "current" transaction may be open per rollback
/// manager instance; older transactions remain addressable by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub points: Vec<RollbackPoint>,
    pub committed: bool,
    pub rolled_back: bool,
}

impl Transaction {
    /// Start a new, empty transaction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            created_at: Utc::now(),
            points: Vec::new(),
            committed: false,
            rolled_back: false,
        }
    }
}
