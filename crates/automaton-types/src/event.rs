//! Lifecycle events published by the workflow engine.
//!
//! Mirrors the engine's optional callback contract (task start/complete/
//! failed, workflow complete) as a serializable enum so the same events can
//! be broadcast to multiple in-process subscribers via
//! `automaton-core::event::bus::EventBus`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One lifecycle transition observed during a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A task was just set to `Running` and its executor is about to be
    /// invoked for the first attempt.
    TaskStarted {
        run_id: Uuid,
        task_id: String,
        task_name: String,
    },
    /// A task's executor succeeded.
    TaskCompleted {
        run_id: Uuid,
        task_id: String,
        task_name: String,
        duration_ms: u64,
    },
    /// A task's retry budget was exhausted without success.
    TaskFailed {
        run_id: Uuid,
        task_id: String,
        task_name: String,
        error: String,
    },
    /// A task's condition evaluated false; its executor was never invoked.
    TaskSkipped {
        run_id: Uuid,
        task_id: String,
        task_name: String,
    },
    /// A task was cancelled mid-run.
    TaskCancelled {
        run_id: Uuid,
        task_id: String,
        task_name: String,
    },
    /// Every task in the workflow reached a terminal state.
    WorkflowCompleted {
        run_id: Uuid,
        workflow_name: String,
        duration_ms: u64,
        tasks_completed: u32,
        tasks_failed: u32,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            WorkflowEvent::TaskStarted { run_id, .. }
            | WorkflowEvent::TaskCompleted { run_id, .. }
            | WorkflowEvent::TaskFailed { run_id, .. }
            | WorkflowEvent::TaskSkipped { run_id, .. }
            | WorkflowEvent::TaskCancelled { run_id, .. }
            | WorkflowEvent::WorkflowCompleted { run_id, .. } => *run_id,
        }
    }
}
