//! Workflow execution context: a flat string-keyed value map threaded
//! through a single workflow run.
//!
//! Exactly one context exists per workflow execution. The scheduler is the
//! only writer; it mutates the context exclusively by inserting
//! `task_<id>_result` after a task completes. Reads happen during parameter
//! resolution and condition evaluation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::definition::WorkflowError;

/// Maximum size of a single value stored in the context (1 MB).
pub const MAX_VALUE_SIZE: usize = 1_048_576;

/// Maximum total size of all context data (10 MB).
pub const MAX_CONTEXT_SIZE: usize = 10_485_760;

/// Mutable key-value store threaded through a workflow execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
    values: HashMap<String, Value>,
}

impl WorkflowContext {
    /// Build a context from the caller-supplied initial values.
    pub fn new(initial: HashMap<String, Value>) -> Self {
        Self { values: initial }
    }

    /// Read a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Record a task's result under its conventional `task_<id>_result` key.
    ///
    /// Enforces `MAX_VALUE_SIZE` per value and `MAX_CONTEXT_SIZE` in total;
    /// oversized values are replaced by a small marker object rather than
    /// rejected, so a single verbose task cannot fail the whole run.
    pub fn set_task_result(&mut self, task_id: &str, result: Value) -> Result<(), WorkflowError> {
        let key = format!("task_{task_id}_result");
        let serialized = serde_json::to_string(&result)
            .map_err(|e| WorkflowError::ExecutionError(e.to_string()))?;

        if serialized.len() > MAX_VALUE_SIZE {
            tracing::warn!(
                task_id,
                size = serialized.len(),
                max = MAX_VALUE_SIZE,
                "task result exceeds size limit, truncating"
            );
            self.values.insert(
                key,
                serde_json::json!({
                    "_truncated": true,
                    "_original_size": serialized.len(),
                }),
            );
        } else {
            self.values.insert(key, result);
        }

        let total = self.total_size();
        if total > MAX_CONTEXT_SIZE {
            return Err(WorkflowError::ExecutionError(format!(
                "total context size ({total} bytes) exceeds maximum ({MAX_CONTEXT_SIZE} bytes)"
            )));
        }
        Ok(())
    }

    /// Resolve a single parameter or condition operand.
    ///
    /// A string beginning with `$` is replaced by the context value at the
    /// key that follows the `$`, when present; the literal `$name` string is
    /// returned unchanged when the key is absent. Every other value type,
    /// including strings not starting with `$`, passes through unchanged.
    /// Nested containers (arrays, objects) are never recursed into -- only
    /// top-level string values are resolved.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => match s.strip_prefix('$') {
                Some(key) => self.values.get(key).cloned().unwrap_or_else(|| value.clone()),
                None => value.clone(),
            },
            other => other.clone(),
        }
    }

    /// Resolve every top-level entry of a parameter map.
    pub fn resolve_params(&self, params: &HashMap<String, Value>) -> HashMap<String, Value> {
        params
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve(v)))
            .collect()
    }

    fn total_size(&self) -> usize {
        self.values
            .values()
            .map(|v| serde_json::to_string(v).map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    /// Serialize the context to JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Restore a context from JSON.
    pub fn from_json(value: Value) -> Result<Self, WorkflowError> {
        serde_json::from_value(value)
            .map_err(|e| WorkflowError::ParseError(format!("failed to restore context: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(key: &str, value: Value) -> WorkflowContext {
        let mut map = HashMap::new();
        map.insert(key.to_string(), value);
        WorkflowContext::new(map)
    }

    #[test]
    fn resolve_dollar_reference_present() {
        let ctx = ctx_with("count", json!(5));
        assert_eq!(ctx.resolve(&json!("$count")), json!(5));
    }

    #[test]
    fn resolve_dollar_reference_missing_returns_literal() {
        let ctx = WorkflowContext::default();
        assert_eq!(ctx.resolve(&json!("$missing")), json!("$missing"));
    }

    #[test]
    fn resolve_non_dollar_string_passes_through() {
        let ctx = WorkflowContext::default();
        assert_eq!(ctx.resolve(&json!("plain")), json!("plain"));
    }

    #[test]
    fn resolve_non_string_value_passes_through() {
        let ctx = WorkflowContext::default();
        assert_eq!(ctx.resolve(&json!(42)), json!(42));
        assert_eq!(ctx.resolve(&json!(["$a", "$b"])), json!(["$a", "$b"]));
    }

    #[test]
    fn set_task_result_uses_conventional_key() {
        let mut ctx = WorkflowContext::default();
        ctx.set_task_result("a", json!("hello")).unwrap();
        assert_eq!(ctx.get("task_a_result"), Some(&json!("hello")));
    }

    #[test]
    fn failed_predecessor_reference_resolves_to_literal() {
        // No result was ever written for task "a" (it failed).
        let ctx = WorkflowContext::default();
        assert_eq!(
            ctx.resolve(&json!("$task_a_result")),
            json!("$task_a_result")
        );
    }

    #[test]
    fn resolve_params_only_resolves_top_level() {
        let ctx = ctx_with("x", json!(1));
        let mut params = HashMap::new();
        params.insert("a".to_string(), json!("$x"));
        params.insert("b".to_string(), json!({"nested": "$x"}));
        let resolved = ctx.resolve_params(&params);
        assert_eq!(resolved["a"], json!(1));
        assert_eq!(resolved["b"], json!({"nested": "$x"}));
    }

    #[test]
    fn json_roundtrip() {
        let mut ctx = WorkflowContext::default();
        ctx.set_task_result("a", json!("news")).unwrap();
        let json = ctx.to_json();
        let restored = WorkflowContext::from_json(json).unwrap();
        assert_eq!(restored.get("task_a_result"), Some(&json!("news")));
    }

    #[test]
    fn oversized_value_is_truncated_not_rejected() {
        let mut ctx = WorkflowContext::default();
        let large = "x".repeat(MAX_VALUE_SIZE + 100);
        ctx.set_task_result("big", json!(large)).unwrap();
        let stored = ctx.get("task_big_result").unwrap();
        assert_eq!(stored["_truncated"], json!(true));
    }
}
