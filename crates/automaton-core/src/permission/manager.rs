//! The permission manager's decision algorithm: risk assessment, rule scan,
//! scope validation, and audit bookkeeping.
//!
//! Grounded in `original_source/.../permissions.py`'s `PermissionManager`:
//! the reverse-scan-first-match rule lookup with in-place expiry removal,
//! the risk-escalation-by-content-inspection rules, and the
//! whitelist/blacklist scope validation, expressed with a `thiserror` error
//! enum and `RwLock`-guarded state instead of Python's unsynchronized lists
//! (the rule list here must tolerate concurrent decisions, per the
//! crate-wide concurrency contract).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use automaton_types::permission::{
    ActionKind, AuditRecord, PermissionDecision, PermissionRule, PermissionStats, RiskLevel,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::audit::{AuditSink, BoxFuture};

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("audit sink write failed: {0}")]
    AuditWriteFailed(String),
}

/// Invoked when a decision resolves to `Prompt`; the boolean return becomes
/// `Allow` (`true`) or `Deny` (`false`).
pub trait PromptCallback: Send + Sync {
    fn prompt(&self, action_kind: ActionKind, params: Value, risk: RiskLevel) -> BoxFuture<'_, bool>;
}

/// The default prompt callback when none is configured: auto-deny. Mirrors
/// the original's `_default_prompt`, which has no interactive surface to
/// fall back on either.
pub struct DenyAllPrompt;

impl PromptCallback for DenyAllPrompt {
    fn prompt(&self, action_kind: ActionKind, params: Value, risk: RiskLevel) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            tracing::warn!(
                ?action_kind,
                ?risk,
                %params,
                "no prompt callback configured, auto-denying"
            );
            false
        })
    }
}

/// Policy decision point: rule scan, risk assessment, scope validation, and
/// audit logging for every effectful action.
pub struct PermissionManager {
    rules: RwLock<Vec<PermissionRule>>,
    audit_logs: RwLock<Vec<AuditRecord>>,
    audit_sink: Arc<dyn AuditSink>,
    prompt: Arc<dyn PromptCallback>,
    whitelist_domains: RwLock<HashSet<String>>,
    blacklist_domains: RwLock<HashSet<String>>,
    whitelist_paths: RwLock<HashSet<PathBuf>>,
    blacklist_paths: RwLock<HashSet<PathBuf>>,
}

impl PermissionManager {
    pub fn new(audit_sink: Arc<dyn AuditSink>) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            audit_logs: RwLock::new(Vec::new()),
            audit_sink,
            prompt: Arc::new(DenyAllPrompt),
            whitelist_domains: RwLock::new(HashSet::new()),
            blacklist_domains: RwLock::new(HashSet::new()),
            whitelist_paths: RwLock::new(HashSet::new()),
            blacklist_paths: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_prompt_callback(mut self, callback: Arc<dyn PromptCallback>) -> Self {
        self.prompt = callback;
        self
    }

    pub fn add_rule(
        &self,
        action_kind: ActionKind,
        decision: PermissionDecision,
        scope: HashMap<String, Value>,
        rationale: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Uuid {
        let rule = PermissionRule {
            id: Uuid::now_v7(),
            action_kind,
            decision,
            scope,
            rationale: rationale.into(),
            expires_at,
        };
        let id = rule.id;
        self.rules.write().unwrap().push(rule);
        id
    }

    pub fn remove_rule(&self, rule_id: Uuid) -> bool {
        let mut rules = self.rules.write().unwrap();
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        rules.len() != before
    }

    pub fn whitelist_domain(&self, domain: impl Into<String>) {
        self.whitelist_domains.write().unwrap().insert(domain.into().to_lowercase());
    }

    pub fn blacklist_domain(&self, domain: impl Into<String>) {
        self.blacklist_domains.write().unwrap().insert(domain.into().to_lowercase());
    }

    pub fn whitelist_path(&self, path: impl Into<PathBuf>) {
        self.whitelist_paths.write().unwrap().insert(path.into());
    }

    pub fn blacklist_path(&self, path: impl Into<PathBuf>) {
        self.blacklist_paths.write().unwrap().insert(path.into());
    }

    /// Decide whether `action_kind` with `params` is permitted, per the
    /// engine's seven-step decision algorithm.
    pub async fn check_permission(
        &self,
        action_kind: ActionKind,
        params: Value,
        metadata: HashMap<String, Value>,
    ) -> Result<bool, PermissionError> {
        let risk = assess_risk(&action_kind, &params);
        let now = Utc::now();

        let matched = self.find_and_clean_matching_rule(&action_kind, &params, now);
        let mut decision = match &matched {
            Some(rule) => rule.decision,
            None => default_decision(risk),
        };

        let mut user_approved = None;
        if decision == PermissionDecision::Prompt {
            let approved = self.prompt.prompt(action_kind.clone(), params.clone(), risk).await;
            user_approved = Some(approved);
            decision = if approved {
                PermissionDecision::Allow
            } else {
                PermissionDecision::Deny
            };
        } else if decision == PermissionDecision::Allow && !self.validate_scope(&action_kind, &params) {
            decision = PermissionDecision::Deny;
        }

        let record = AuditRecord {
            id: Uuid::now_v7(),
            timestamp: now,
            action_kind,
            action_params: params,
            decision,
            user_approved,
            risk_level: risk,
            metadata,
        };

        self.audit_sink
            .write(record.clone())
            .await
            .map_err(|e| PermissionError::AuditWriteFailed(e.to_string()))?;
        self.audit_logs.write().unwrap().push(record);

        Ok(decision == PermissionDecision::Allow)
    }

    /// Scan rules most-recent-first; drop any expired rule encountered along
    /// the way regardless of whether it matches, then return the first rule
    /// whose action kind and scope match.
    fn find_and_clean_matching_rule(
        &self,
        action_kind: &ActionKind,
        params: &Value,
        now: DateTime<Utc>,
    ) -> Option<PermissionRule> {
        let mut rules = self.rules.write().unwrap();
        let mut matched: Option<usize> = None;
        let mut i = rules.len();
        while i > 0 {
            i -= 1;
            if rules[i].is_expired(now) {
                rules.remove(i);
                continue;
            }
            if rules[i].action_kind != *action_kind {
                continue;
            }
            if match_scope(&rules[i].scope, params) {
                matched = Some(i);
                break;
            }
        }
        matched.map(|i| rules[i].clone())
    }

    fn validate_scope(&self, action_kind: &ActionKind, params: &Value) -> bool {
        match action_kind {
            ActionKind::BrowserNavigate => {
                let url = params.get("url").and_then(Value::as_str).unwrap_or("");
                let domain = extract_domain(url);
                let blacklist = self.blacklist_domains.read().unwrap();
                if blacklist.contains(&domain) {
                    return false;
                }
                let whitelist = self.whitelist_domains.read().unwrap();
                if !whitelist.is_empty() && !whitelist.contains(&domain) {
                    return false;
                }
                true
            }
            ActionKind::FileRead | ActionKind::FileWrite | ActionKind::FileDelete => {
                let path_str = params.get("path").and_then(Value::as_str).unwrap_or("");
                let path = Path::new(path_str);
                let blacklist = self.blacklist_paths.read().unwrap();
                if blacklist.iter().any(|bp| path.starts_with(bp)) {
                    return false;
                }
                let whitelist = self.whitelist_paths.read().unwrap();
                if !whitelist.is_empty() && !whitelist.iter().any(|wp| path.starts_with(wp)) {
                    return false;
                }
                true
            }
            _ => true,
        }
    }

    pub fn get_audit_logs(
        &self,
        action_kind: Option<&ActionKind>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<AuditRecord> {
        let logs = self.audit_logs.read().unwrap();
        let mut filtered: Vec<AuditRecord> = logs
            .iter()
            .filter(|log| action_kind.is_none_or(|k| &log.action_kind == k))
            .filter(|log| since.is_none_or(|s| log.timestamp >= s))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        filtered.truncate(limit);
        filtered
    }

    pub fn get_statistics(&self) -> PermissionStats {
        let logs = self.audit_logs.read().unwrap();
        if logs.is_empty() {
            return PermissionStats::default();
        }

        let mut by_action_kind = HashMap::new();
        let mut by_risk = HashMap::new();
        let mut by_decision = HashMap::new();
        let mut prompted = 0u64;
        let mut prompt_approved = 0u64;

        for log in logs.iter() {
            *by_action_kind.entry(action_kind_label(&log.action_kind)).or_insert(0) += 1;
            *by_risk.entry(risk_label(log.risk_level)).or_insert(0) += 1;
            *by_decision.entry(decision_label(log.decision)).or_insert(0) += 1;
            if let Some(approved) = log.user_approved {
                prompted += 1;
                if approved {
                    prompt_approved += 1;
                }
            }
        }

        PermissionStats {
            by_action_kind,
            by_risk,
            by_decision,
            prompt_approval_rate: if prompted > 0 {
                prompt_approved as f64 / prompted as f64
            } else {
                0.0
            },
        }
    }
}

fn action_kind_label(kind: &ActionKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.get("kind").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn risk_label(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
    .to_string()
}

fn decision_label(decision: PermissionDecision) -> String {
    match decision {
        PermissionDecision::Allow => "allow",
        PermissionDecision::Deny => "deny",
        PermissionDecision::Prompt => "prompt",
    }
    .to_string()
}

fn default_decision(risk: RiskLevel) -> PermissionDecision {
    match risk {
        RiskLevel::Critical | RiskLevel::High => PermissionDecision::Prompt,
        RiskLevel::Medium | RiskLevel::Low => PermissionDecision::Allow,
    }
}

fn base_risk(action_kind: &ActionKind) -> RiskLevel {
    match action_kind {
        ActionKind::MouseEvent => RiskLevel::Low,
        ActionKind::KeyboardEvent => RiskLevel::Medium,
        ActionKind::WindowOp => RiskLevel::Medium,
        ActionKind::BrowserNavigate => RiskLevel::Medium,
        ActionKind::BrowserFormFill => RiskLevel::High,
        ActionKind::FileRead => RiskLevel::Medium,
        ActionKind::FileWrite => RiskLevel::High,
        ActionKind::FileDelete => RiskLevel::Critical,
        ActionKind::CodeExecution => RiskLevel::Critical,
        ActionKind::NetworkRequest => RiskLevel::Medium,
        ActionKind::Other { .. } => RiskLevel::Medium,
    }
}

/// Base risk, escalated by content inspection per action kind.
fn assess_risk(action_kind: &ActionKind, params: &Value) -> RiskLevel {
    let base = base_risk(action_kind);

    match action_kind {
        ActionKind::FileWrite => {
            let path = params.get("path").and_then(Value::as_str).unwrap_or("").to_lowercase();
            const RESERVED: [&str; 3] = ["system32", "windows", "program files"];
            if RESERVED.iter().any(|r| path.contains(r)) {
                return RiskLevel::Critical;
            }
        }
        ActionKind::BrowserNavigate => {
            let url = params.get("url").and_then(Value::as_str).unwrap_or("").to_lowercase();
            const DANGEROUS_SCHEMES: [&str; 3] = ["file://", "javascript:", "data:"];
            if DANGEROUS_SCHEMES.iter().any(|s| url.contains(s)) {
                return base.max(RiskLevel::High);
            }
        }
        ActionKind::CodeExecution => {
            let code = params.get("code").and_then(Value::as_str).unwrap_or("").to_lowercase();
            const DESTRUCTIVE_MARKERS: [&str; 4] = ["rm -rf", "del /f", "format", "mkfs"];
            if DESTRUCTIVE_MARKERS.iter().any(|m| code.contains(m)) {
                return RiskLevel::Critical;
            }
        }
        _ => {}
    }

    base
}

/// A rule's scope predicate matches when every `(key, pattern)` entry has a
/// corresponding `action_params` field: string patterns are regex, every
/// other JSON type is matched by equality.
fn match_scope(scope: &HashMap<String, Value>, params: &Value) -> bool {
    for (key, pattern) in scope {
        let Some(value) = params.get(key) else {
            return false;
        };
        let matched = match (pattern, value) {
            (Value::String(pat), Value::String(val)) => Regex::new(pat)
                .map(|re| re.is_match(val))
                .unwrap_or_else(|e| {
                    tracing::warn!(pattern = %pat, error = %e, "invalid scope regex, treating as no match");
                    false
                }),
            _ => pattern == value,
        };
        if !matched {
            return false;
        }
    }
    true
}

fn extract_domain(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let domain = without_scheme.split(['/', '?', '#']).next().unwrap_or("");
    domain.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::super::audit::test_support::VecAuditSink;
    use super::*;
    use serde_json::json;

    fn manager() -> (PermissionManager, Arc<VecAuditSink>) {
        let sink = Arc::new(VecAuditSink::default());
        (PermissionManager::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn low_risk_action_allowed_by_default() {
        let (mgr, _sink) = manager();
        let allowed = mgr
            .check_permission(ActionKind::MouseEvent, json!({"x": 1, "y": 2}), HashMap::new())
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn critical_risk_with_no_rule_is_denied_by_default_prompt() {
        let (mgr, _sink) = manager();
        let allowed = mgr
            .check_permission(ActionKind::FileDelete, json!({"path": "/tmp/x"}), HashMap::new())
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn file_write_to_reserved_path_escalates_to_critical_and_prompts() {
        let (mgr, sink) = manager();
        let allowed = mgr
            .check_permission(
                ActionKind::FileWrite,
                json!({"path": "C:/Windows/System32/evil.dll"}),
                HashMap::new(),
            )
            .await
            .unwrap();
        assert!(!allowed);
        let logs = sink.records.lock().unwrap();
        assert_eq!(logs[0].risk_level, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn explicit_allow_rule_overrides_default_prompt() {
        let (mgr, _sink) = manager();
        mgr.add_rule(
            ActionKind::FileDelete,
            PermissionDecision::Allow,
            HashMap::new(),
            "test override",
            None,
        );
        let allowed = mgr
            .check_permission(ActionKind::FileDelete, json!({"path": "/tmp/x"}), HashMap::new())
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn most_recently_added_rule_wins() {
        let (mgr, _sink) = manager();
        mgr.add_rule(ActionKind::FileDelete, PermissionDecision::Allow, HashMap::new(), "old", None);
        mgr.add_rule(ActionKind::FileDelete, PermissionDecision::Deny, HashMap::new(), "new", None);
        let allowed = mgr
            .check_permission(ActionKind::FileDelete, json!({"path": "/tmp/x"}), HashMap::new())
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn expired_rule_is_removed_and_skipped() {
        let (mgr, _sink) = manager();
        mgr.add_rule(
            ActionKind::FileDelete,
            PermissionDecision::Allow,
            HashMap::new(),
            "expired",
            Some(Utc::now() - chrono::Duration::seconds(1)),
        );
        let allowed = mgr
            .check_permission(ActionKind::FileDelete, json!({"path": "/tmp/x"}), HashMap::new())
            .await
            .unwrap();
        assert!(!allowed); // falls through to default (Critical -> Prompt -> deny)
        assert_eq!(mgr.rules.read().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn scope_regex_restricts_rule_to_matching_params() {
        let (mgr, _sink) = manager();
        let mut scope = HashMap::new();
        scope.insert("path".to_string(), json!(r"^/tmp/.*"));
        mgr.add_rule(ActionKind::FileWrite, PermissionDecision::Allow, scope, "tmp only", None);

        let allowed_tmp = mgr
            .check_permission(ActionKind::FileWrite, json!({"path": "/tmp/scratch.txt"}), HashMap::new())
            .await
            .unwrap();
        assert!(allowed_tmp);

        let allowed_other = mgr
            .check_permission(ActionKind::FileWrite, json!({"path": "/etc/passwd"}), HashMap::new())
            .await
            .unwrap();
        assert!(!allowed_other);
    }

    #[tokio::test]
    async fn blacklisted_domain_denies_even_when_rule_allows() {
        let (mgr, _sink) = manager();
        mgr.blacklist_domain("evil.example.com");
        mgr.add_rule(ActionKind::BrowserNavigate, PermissionDecision::Allow, HashMap::new(), "broad", None);

        let allowed = mgr
            .check_permission(
                ActionKind::BrowserNavigate,
                json!({"url": "https://evil.example.com/path"}),
                HashMap::new(),
            )
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn statistics_aggregate_by_decision_and_risk() {
        let (mgr, _sink) = manager();
        mgr.check_permission(ActionKind::MouseEvent, json!({}), HashMap::new()).await.unwrap();
        mgr.check_permission(ActionKind::FileDelete, json!({"path": "/tmp/x"}), HashMap::new())
            .await
            .unwrap();

        let stats = mgr.get_statistics();
        assert_eq!(stats.by_decision.get("allow"), Some(&1));
        assert_eq!(stats.by_decision.get("deny"), Some(&1));
        assert_eq!(stats.by_risk.get("low"), Some(&1));
        assert_eq!(stats.by_risk.get("critical"), Some(&1));
    }

    #[test]
    fn extract_domain_strips_scheme_and_path() {
        assert_eq!(extract_domain("https://example.com/path?x=1"), "example.com");
        assert_eq!(extract_domain("example.com"), "example.com");
    }

    #[test]
    fn match_scope_equality_for_non_string_pattern() {
        let mut scope = HashMap::new();
        scope.insert("count".to_string(), json!(5));
        assert!(match_scope(&scope, &json!({"count": 5})));
        assert!(!match_scope(&scope, &json!({"count": 6})));
    }
}
