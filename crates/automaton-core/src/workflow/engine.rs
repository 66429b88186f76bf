//! The workflow engine: layered DAG dispatch, retries, timeouts, and
//! cancellation.
//!
//! Grounded in the teacher's `workflow/executor.rs` for its concurrency
//! mechanics (`JoinSet` per wave, a counting `Semaphore`,
//! `tokio_util::sync::CancellationToken`, `DashMap`-keyed per-run state, and
//! event-bus publication at lifecycle points), but the per-task loop and
//! public contract follow the nine-step algorithm of the automation core's
//! own task-execution design rather than the teacher's step-type dispatch.
//!
//! The engine's "callbacks" are realized as `WorkflowEvent` publications on
//! the shared `EventBus` rather than caller-supplied closures: a panicking
//! subscriber can never unwind into the scheduler, which satisfies the
//! "callback exceptions must never propagate" requirement without a
//! catch-unwind boundary.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use automaton_types::event::WorkflowEvent;
use automaton_types::workflow::{Task, TaskStatus, WorkflowDefinition};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::bus::EventBus;

use super::context::WorkflowContext;
use super::dag::{build_execution_plan, validate_dag};
use super::definition::WorkflowError;
use super::{condition, retry::RetryPolicy};

/// A boxed, owned future -- the manual async-trait-object pattern used so
/// `TaskExecutor` implementations can be stored behind `Arc<dyn _>` in the
/// engine's registry without pulling in an async-trait macro crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A registered capability that performs a task's work.
///
/// `invoke` receives the task's parameter map with every `$name` reference
/// already resolved against the run context, and returns either a result
/// value or an error description. Errors are data, not panics or exceptions
/// -- retries are driven by the returned variant.
pub trait TaskExecutor: Send + Sync {
    /// Perform the task's work.
    fn invoke(&self, params: HashMap<String, Value>) -> BoxFuture<'_, Result<Value, String>>;
}

/// Wraps a plain async closure as a `TaskExecutor`, for executors that need
/// no internal state.
pub struct FnExecutor<F>(pub F);

impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(HashMap<String, Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, String>> + Send + 'static,
{
    fn invoke(&self, params: HashMap<String, Value>) -> BoxFuture<'_, Result<Value, String>> {
        Box::pin((self.0)(params))
    }
}

/// Outcome of a completed (or cancelled) workflow execution.
///
/// Unlike task-level failure, which never aborts a run, the overall `Err`
/// path is reserved for validation failures detected before any task ran
/// (see `WorkflowError`).
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub run_id: Uuid,
    pub context: WorkflowContext,
    /// Final state of every task, in the order they appear in the
    /// definition.
    pub tasks: Vec<Task>,
}

/// Layered DAG executor. One instance can run many workflows; the executor
/// registry and concurrency ceiling are shared across all of them.
pub struct WorkflowEngine {
    executors: DashMap<String, Arc<dyn TaskExecutor>>,
    event_bus: EventBus,
    max_parallel_tasks: usize,
    cancellation_tokens: DashMap<Uuid, CancellationToken>,
}

impl WorkflowEngine {
    /// Build a new engine. `max_parallel_tasks` bounds the number of tasks
    /// concurrently `Running` within any single layer of any single run.
    pub fn new(event_bus: EventBus, max_parallel_tasks: usize) -> Self {
        Self {
            executors: DashMap::new(),
            event_bus,
            max_parallel_tasks,
            cancellation_tokens: DashMap::new(),
        }
    }

    /// Bind `action` to `executor`. Re-registration overwrites the previous
    /// binding.
    pub fn register_executor(&self, action: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(action.into(), executor);
    }

    /// Best-effort cancellation: every task currently `Running` in `run_id`
    /// transitions to `Cancelled` at its next suspension point; layers not
    /// yet dispatched never run.
    pub fn cancel_workflow(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        match self.cancellation_tokens.get(&run_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(WorkflowError::ExecutionError(format!(
                "workflow run '{run_id}' not found"
            ))),
        }
    }

    /// Run a workflow to completion: every task reaches a terminal state.
    ///
    /// Per-task failure never fails the run -- failures are surfaced only
    /// through task state. The only `Err` return is a validation failure
    /// (a cyclic dependency graph), detected before any task is dispatched.
    pub async fn execute_workflow(
        &self,
        definition: &WorkflowDefinition,
        initial_context: HashMap<String, Value>,
    ) -> Result<EngineResult, WorkflowError> {
        validate_dag(&definition.tasks)?;

        let run_id = Uuid::now_v7();
        let cancel_token = CancellationToken::new();
        self.cancellation_tokens.insert(run_id, cancel_token.clone());

        let order: Vec<String> = definition.tasks.iter().map(|t| t.id.clone()).collect();
        let layers_refs = build_execution_plan(&definition.tasks)?;
        let layers: Vec<Vec<String>> = layers_refs
            .into_iter()
            .map(|layer| layer.into_iter().map(|t| t.id.clone()).collect())
            .collect();

        let mut tasks: HashMap<String, Task> = definition
            .tasks
            .iter()
            .cloned()
            .map(|t| (t.id.clone(), t))
            .collect();
        let mut ctx = WorkflowContext::new(initial_context);
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_tasks.max(1)));

        for layer in &layers {
            if cancel_token.is_cancelled() {
                break;
            }

            let mut join_set = JoinSet::new();

            for task_id in layer {
                let mut task = tasks
                    .remove(task_id)
                    .expect("layer only names ids present in the task map");

                if let Some(cond) = task.condition.clone() {
                    if !condition::evaluate(&cond, &ctx) {
                        task.status = TaskStatus::Skipped;
                        self.event_bus.publish(WorkflowEvent::TaskSkipped {
                            run_id,
                            task_id: task.id.clone(),
                            task_name: task.name.clone(),
                        });
                        tasks.insert(task.id.clone(), task);
                        continue;
                    }
                }

                let executor = self.executors.get(&task.action).map(|e| e.clone());
                let semaphore = Arc::clone(&semaphore);
                let token = cancel_token.clone();
                let ctx_snapshot = ctx.clone();
                let event_bus = self.event_bus.clone();

                join_set.spawn(run_task(task, executor, semaphore, token, ctx_snapshot, event_bus, run_id));
            }

            while let Some(joined) = join_set.join_next().await {
                let task = joined.map_err(|e| {
                    WorkflowError::ExecutionError(format!("task join error: {e}"))
                })?;

                if task.status == TaskStatus::Completed {
                    if let Some(result) = task.result.clone() {
                        ctx.set_task_result(&task.id, result)?;
                    }
                }
                tasks.insert(task.id.clone(), task);
            }
        }

        self.cancellation_tokens.remove(&run_id);

        let final_tasks: Vec<Task> = order
            .into_iter()
            .map(|id| tasks.remove(&id).expect("every task id remains addressable"))
            .collect();

        let completed = final_tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
        let failed = final_tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
        self.event_bus.publish(WorkflowEvent::WorkflowCompleted {
            run_id,
            workflow_name: definition.name.clone(),
            duration_ms: 0,
            tasks_completed: completed as u32,
            tasks_failed: failed as u32,
        });

        Ok(EngineResult {
            run_id,
            context: ctx,
            tasks: final_tasks,
        })
    }
}

/// The nine-step per-task execution loop, run inside its own spawned task so
/// that concurrent tasks in a layer retry independently of one another.
#[allow(clippy::too_many_arguments)]
async fn run_task(
    mut task: Task,
    executor: Option<Arc<dyn TaskExecutor>>,
    semaphore: Arc<Semaphore>,
    cancel_token: CancellationToken,
    ctx_snapshot: WorkflowContext,
    event_bus: EventBus,
    run_id: Uuid,
) -> Task {
    let permit = semaphore
        .acquire_owned()
        .await
        .expect("engine never closes its own semaphore");

    if cancel_token.is_cancelled() {
        task.status = TaskStatus::Cancelled;
        return task;
    }

    task.status = TaskStatus::Running;
    task.started_at = Some(Utc::now());
    event_bus.publish(WorkflowEvent::TaskStarted {
        run_id,
        task_id: task.id.clone(),
        task_name: task.name.clone(),
    });

    let Some(executor) = executor else {
        task.status = TaskStatus::Failed;
        task.error = Some(format!("no executor registered for action '{}'", task.action));
        task.completed_at = Some(Utc::now());
        event_bus.publish(WorkflowEvent::TaskFailed {
            run_id,
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            error: task.error.clone().unwrap_or_default(),
        });
        drop(permit);
        return task;
    };

    let start = std::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if cancel_token.is_cancelled() {
            task.status = TaskStatus::Cancelled;
            break;
        }

        let params = ctx_snapshot.resolve_params(&task.params);
        let timeout = Duration::from_secs(task.timeout_secs);
        let outcome = tokio::time::timeout(timeout, executor.invoke(params)).await;

        match outcome {
            Ok(Ok(value)) => {
                task.result = Some(value);
                task.error = None;
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
                event_bus.publish(WorkflowEvent::TaskCompleted {
                    run_id,
                    task_id: task.id.clone(),
                    task_name: task.name.clone(),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                break;
            }
            Ok(Err(err_msg)) => {
                task.error = Some(err_msg);
            }
            Err(_elapsed) => {
                task.error = Some(format!(
                    "task exceeded timeout of {} seconds",
                    task.timeout_secs
                ));
            }
        }

        attempt += 1;
        task.retry_count = attempt;

        if !RetryPolicy::should_retry(attempt, task.max_retries) {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            event_bus.publish(WorkflowEvent::TaskFailed {
                run_id,
                task_id: task.id.clone(),
                task_name: task.name.clone(),
                error: task.error.clone().unwrap_or_default(),
            });
            break;
        }

        tokio::time::sleep(RetryPolicy::backoff(attempt)).await;
    }

    drop(permit);
    task
}
