//! Condition evaluation: the gate checked before a task is dispatched.
//!
//! Operands are resolved against the run context exactly like task
//! parameters (a `$name` string is replaced by the context value at that
//! key, or left as the literal string when absent) before the operator is
//! applied.

use automaton_types::workflow::{Condition, ConditionOperator};
use serde_json::Value;

use super::context::WorkflowContext;

/// Evaluate a condition against the current context.
///
/// `Always` ignores both operands and returns `true`. `Contains` treats the
/// right operand as a substring of the left when both are strings, or as an
/// element match when the left is a JSON array; any other combination is
/// `false`. The comparison operators (`Eq`, `Ne`, `Lt`, `Gt`) compare
/// numerically when both operands parse as JSON numbers, falling back to
/// string comparison of their JSON text otherwise.
pub fn evaluate(condition: &Condition, ctx: &WorkflowContext) -> bool {
    if condition.operator == ConditionOperator::Always {
        return true;
    }

    let left = ctx.resolve(&condition.left);
    let right = condition
        .right
        .as_ref()
        .map(|r| ctx.resolve(r))
        .unwrap_or(Value::Null);

    match condition.operator {
        ConditionOperator::Always => true,
        ConditionOperator::Eq => compare(&left, &right) == std::cmp::Ordering::Equal,
        ConditionOperator::Ne => compare(&left, &right) != std::cmp::Ordering::Equal,
        ConditionOperator::Lt => compare(&left, &right) == std::cmp::Ordering::Less,
        ConditionOperator::Gt => compare(&left, &right) == std::cmp::Ordering::Greater,
        ConditionOperator::Contains => contains(&left, &right),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> std::cmp::Ordering {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal);
    }
    text(left).cmp(&text(right))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    match left {
        Value::String(haystack) => match right {
            Value::String(needle) => haystack.contains(needle.as_str()),
            other => haystack.contains(&text(other)),
        },
        Value::Array(items) => items.contains(right),
        _ => false,
    }
}
