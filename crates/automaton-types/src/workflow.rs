//! Workflow and task definitions for the automation execution core.
//!
//! A [`WorkflowDefinition`] is an immutable, ordered collection of [`Task`]s.
//! Dependencies between tasks are expressed by id and form a DAG; the engine
//! (in `automaton-core`) computes topological layers from this shape. Task
//! parameters and conditions may reference the run's context via `$name`
//! strings, resolved at dispatch time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A named, ordered collection of tasks. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Stable identifier for this workflow.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered task collection.
    pub tasks: Vec<Task>,
    /// Free-form metadata carried alongside the definition (not read by the
    /// engine itself).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Default per-task retry budget.
pub fn default_max_retries() -> u32 {
    3
}

/// Default per-attempt timeout, in seconds.
pub fn default_timeout_secs() -> u64 {
    60
}

/// A unit of work dispatched by the workflow engine.
///
/// `params` values may be literals of any JSON type, or a string beginning
/// with `$`, which is resolved against the run's context at dispatch time
/// (see `automaton-core::workflow::context`). Only top-level string values
/// are resolved; `$name` references nested inside arrays or objects are left
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque task identifier, unique within a workflow.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Key naming a registered executor.
    pub action: String,
    /// Resolved-at-dispatch parameter map.
    #[serde(default)]
    pub params: HashMap<String, Value>,
    /// Ids of tasks that must reach a terminal state before this one is
    /// eligible for dispatch.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Gate evaluated at dispatch time; `false` transitions the task
    /// directly to `Skipped` without invoking its executor.
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt wall-clock timeout, in seconds.
    #[serde(rename = "timeout", alias = "timeout_secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Current state. Mutated by the engine during execution; not part of
    /// the declarative definition (defaults to `Pending` when a workflow is
    /// freshly ingested).
    #[serde(default)]
    pub status: TaskStatus,
    /// Result value once `Completed`.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error text once `Failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Timestamp of the task's (single) transition into `Running`.
    #[serde(default)]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Timestamp of the task's transition into a terminal state.
    #[serde(default)]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Number of retry attempts taken so far (0 on first attempt).
    #[serde(default)]
    pub retry_count: u32,
}

impl Task {
    /// Construct a task with the given id, name, and action, and every other
    /// field at its default.
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            action: action.into(),
            params: HashMap::new(),
            dependencies: Vec::new(),
            condition: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
        }
    }
}

/// Terminal and non-terminal states in a task's lifecycle.
///
/// `Pending -> Running -> {Completed, Failed, Skipped, Cancelled}`. `Skipped`
/// and `Cancelled` are reachable only from `Pending`/`Running` respectively
/// and are never revisited; a task enters `Running` at most once per
/// workflow execution (retries happen inside the same `Running` episode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet dispatched.
    #[default]
    Pending,
    /// Dispatched; may be retrying internally.
    Running,
    /// Executor succeeded.
    Completed,
    /// Retry budget exhausted without success.
    Failed,
    /// Condition evaluated false at dispatch time; executor never invoked.
    Skipped,
    /// Workflow was cancelled while this task was `Running`.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions possible).
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A gate evaluated against the run context before a task is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub operator: ConditionOperator,
    /// Left operand; a `$name` string is resolved against the context.
    pub left: Value,
    /// Right operand; absent when `operator` is `Always`.
    #[serde(default)]
    pub right: Option<Value>,
}

/// Supported condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[serde(alias = "=")]
    Eq,
    #[serde(alias = "ne", alias = "!=")]
    Ne,
    #[serde(alias = "lt", alias = "<")]
    Lt,
    #[serde(alias = "gt", alias = ">")]
    Gt,
    Contains,
    Always,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
