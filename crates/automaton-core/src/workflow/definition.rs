//! Workflow definition ingestion and validation.
//!
//! Converts the external JSON ingestion format (see the workflow engine's
//! external-interfaces contract) into the canonical `WorkflowDefinition` IR
//! and validates structural constraints (unique task ids, known
//! dependencies, acyclicity).

use std::collections::HashSet;

use automaton_types::workflow::WorkflowDefinition;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during workflow ingestion and execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// JSON/YAML parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Dependency graph contains a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// A task references an unknown dependency.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// A task references an action with no registered executor.
    #[error("no executor registered for action '{0}'")]
    UnknownExecutor(String),

    /// Runtime execution failure.
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Concurrency limit for this workflow was reached.
    #[error("concurrency limit reached")]
    ConcurrencyLimitReached,
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Parse the JSON ingestion format into a validated `WorkflowDefinition`.
///
/// Tasks that omit `id` are assigned a fresh id (a v7 UUID string) before
/// dependency references are validated, so both caller-supplied and
/// engine-generated ids resolve identically in the `dependencies` arrays.
pub fn ingest_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let mut def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    assign_missing_ids(&mut def);
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a YAML-equivalent ingestion document (same shape, YAML syntax).
pub fn ingest_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let mut def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    assign_missing_ids(&mut def);
    validate_definition(&def)?;
    Ok(def)
}

fn assign_missing_ids(def: &mut WorkflowDefinition) {
    for task in &mut def.tasks {
        if task.id.is_empty() {
            task.id = Uuid::now_v7().to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks: non-empty name, at least one task, unique task ids, and that
/// every `dependencies` entry references a task id present in the
/// definition. Acyclicity is checked separately by
/// `dag::build_execution_plan`/`dag::validate_dag`, which run at dispatch
/// time over the same task list.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.name.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }

    if def.tasks.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must have at least one task".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for task in &def.tasks {
        if !seen_ids.insert(task.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate task ID: '{}'",
                task.id
            )));
        }
    }

    for task in &def.tasks {
        for dep in &task.dependencies {
            if !seen_ids.contains(dep.as_str()) {
                return Err(WorkflowError::UnknownDependency(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, dep
                )));
            }
        }
    }

    for task in &def.tasks {
        if task.max_retries > 100 {
            return Err(WorkflowError::ValidationError(format!(
                "task '{}' max_retries ({}) is unreasonably large",
                task.id, task.max_retries
            )));
        }
        if task.timeout_secs == 0 {
            return Err(WorkflowError::ValidationError(format!(
                "task '{}' timeout must be > 0",
                task.id
            )));
        }
    }

    crate::workflow::dag::validate_dag(&def.tasks).map_err(|e| match e {
        WorkflowError::CycleDetected(msg) => WorkflowError::CycleDetected(msg),
        other => other,
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingest_generates_ids_for_tasks_missing_one() {
        let doc = json!({
            "name": "demo",
            "tasks": [
                {"name": "Gather", "action": "noop"},
                {"name": "Analyze", "action": "noop", "dependencies": []}
            ]
        });
        let def = ingest_workflow_json(&doc.to_string()).unwrap();
        assert_eq!(def.tasks.len(), 2);
        assert!(!def.tasks[0].id.is_empty());
        assert_ne!(def.tasks[0].id, def.tasks[1].id);
    }

    #[test]
    fn ingest_preserves_caller_supplied_ids_in_dependencies() {
        let doc = json!({
            "name": "demo",
            "tasks": [
                {"id": "gather", "name": "Gather", "action": "noop"},
                {"id": "analyze", "name": "Analyze", "action": "noop", "dependencies": ["gather"]}
            ]
        });
        let def = ingest_workflow_json(&doc.to_string()).unwrap();
        assert_eq!(def.tasks[1].dependencies, vec!["gather".to_string()]);
    }

    #[test]
    fn ingest_rejects_unknown_dependency() {
        let doc = json!({
            "name": "demo",
            "tasks": [
                {"id": "a", "name": "A", "action": "noop", "dependencies": ["missing"]}
            ]
        });
        let err = ingest_workflow_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("unknown task"));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let doc = json!({
            "name": "demo",
            "tasks": [
                {"id": "a", "name": "A", "action": "noop"},
                {"id": "a", "name": "A2", "action": "noop"}
            ]
        });
        let err = ingest_workflow_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("duplicate task ID"));
    }

    #[test]
    fn validate_rejects_empty_workflow() {
        let doc = json!({"name": "demo", "tasks": []});
        let err = ingest_workflow_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("at least one task"));
    }

    #[test]
    fn validate_rejects_cyclic_workflow() {
        let doc = json!({
            "name": "demo",
            "tasks": [
                {"id": "a", "name": "A", "action": "noop", "dependencies": ["b"]},
                {"id": "b", "name": "B", "action": "noop", "dependencies": ["a"]}
            ]
        });
        let err = ingest_workflow_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("cycle detected"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let doc = json!({
            "name": "demo",
            "tasks": [{"id": "a", "name": "A", "action": "noop", "timeout": 0}]
        });
        let err = ingest_workflow_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("timeout must be > 0"));
    }

    #[test]
    fn yaml_ingestion_parses_same_shape() {
        let yaml = "name: demo\ntasks:\n  - id: a\n    name: A\n    action: noop\n";
        let def = ingest_workflow_yaml(yaml).unwrap();
        assert_eq!(def.name, "demo");
        assert_eq!(def.tasks.len(), 1);
    }
}
