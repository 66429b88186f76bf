//! Permission manager types: actions, risk, rules, and audit records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Taxonomy of effectful actions the permission manager can gate.
///
/// Not exhaustive of every possible future action -- `Other` carries a
/// caller-supplied label for actions outside the enumerated set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionKind {
    MouseEvent,
    KeyboardEvent,
    WindowOp,
    BrowserNavigate,
    BrowserFormFill,
    FileRead,
    FileWrite,
    FileDelete,
    CodeExecution,
    NetworkRequest,
    Other { label: String },
}

/// Assessed severity of an action, before or after content-based escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Outcome of a permission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    Deny,
    Prompt,
}

/// A standing policy rule: a (action kind, scope predicate) pair bound to a
/// decision, with optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub id: Uuid,
    pub action_kind: ActionKind,
    pub decision: PermissionDecision,
    /// Per-parameter-name match pattern. String values are regex; all other
    /// JSON value types are matched by equality.
    #[serde(default)]
    pub scope: HashMap<String, Value>,
    pub rationale: String,
    /// Rule expires and is treated as absent (and removed on first
    /// encounter) once `Utc::now() > expires_at`.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionRule {
    /// Whether this rule has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

/// A single durable, append-only permission decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action_kind: ActionKind,
    /// Defensive copy of the action's parameters at decision time.
    pub action_params: Value,
    pub decision: PermissionDecision,
    /// Whether a human approved the action, when the outcome was `Prompt`.
    pub user_approved: Option<bool>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Aggregate statistics exposed by the permission manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionStats {
    pub by_action_kind: HashMap<String, u64>,
    pub by_risk: HashMap<String, u64>,
    pub by_decision: HashMap<String, u64>,
    /// `approved / (approved + denied)` among prompts that were actually
    /// shown to a human. `0.0` when no prompts have been shown.
    pub prompt_approval_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rule_expiry_in_past_is_expired() {
        let rule = PermissionRule {
            id: Uuid::now_v7(),
            action_kind: ActionKind::FileWrite,
            decision: PermissionDecision::Allow,
            scope: HashMap::new(),
            rationale: "test".to_string(),
            expires_at: Some(Utc::now() - Duration::seconds(1)),
        };
        assert!(rule.is_expired(Utc::now()));
    }

    #[test]
    fn rule_with_no_expiry_never_expires() {
        let rule = PermissionRule {
            id: Uuid::now_v7(),
            action_kind: ActionKind::FileWrite,
            decision: PermissionDecision::Allow,
            scope: HashMap::new(),
            rationale: "test".to_string(),
            expires_at: None,
        };
        assert!(!rule.is_expired(Utc::now()));
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn action_kind_other_carries_label() {
        let kind = ActionKind::Other { label: "custom".to_string() };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "other");
        assert_eq!(json["label"], "custom");
    }

    #[test]
    fn audit_record_serde_roundtrip() {
        let record = AuditRecord {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            action_kind: ActionKind::CodeExecution,
            action_params: serde_json::json!({"language": "python"}),
            decision: PermissionDecision::Allow,
            user_approved: None,
            risk_level: RiskLevel::Medium,
            metadata: HashMap::new(),
        };
        let line = serde_json::to_string(&record).unwrap();
        let restored: AuditRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(restored.decision, PermissionDecision::Allow);
        assert_eq!(restored.risk_level, RiskLevel::Medium);
    }
}
