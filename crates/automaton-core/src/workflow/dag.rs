//! DAG builder, cycle detection, and parallel layer computation.
//!
//! Uses `petgraph` to model task dependencies as a directed graph. Topological
//! sort detects cycles, and depth-based grouping produces parallel execution
//! layers where all tasks in a layer can run concurrently.

use std::collections::HashMap;

use automaton_types::workflow::Task;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::definition::WorkflowError;

// ---------------------------------------------------------------------------
// Execution plan (layer computation)
// ---------------------------------------------------------------------------

/// Build an execution plan from workflow tasks, grouping them into parallel
/// layers.
///
/// Each layer contains tasks that can execute concurrently because all their
/// dependencies are satisfied by prior layers. The algorithm:
///
/// 1. Build a `DiGraph` with task IDs as nodes and `dependencies` edges.
/// 2. Run `petgraph::algo::toposort` to verify acyclicity.
/// 3. Compute each node's depth (max dependency depth + 1).
/// 4. Group tasks by depth into layers.
///
/// Returns `Vec<Vec<&Task>>` where index 0 is the first layer to execute.
pub fn build_execution_plan<'a>(tasks: &'a [Task]) -> Result<Vec<Vec<&'a Task>>, WorkflowError> {
    if tasks.is_empty() {
        return Ok(vec![]);
    }

    let id_to_task: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let id_to_idx: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    // Edge from dependency -> dependent.
    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = tasks.iter().map(|t| graph.add_node(t.id.as_str())).collect();

    for task in tasks {
        let to_idx = id_to_idx[task.id.as_str()];
        for dep in &task.dependencies {
            let from_idx = id_to_idx.get(dep.as_str()).ok_or_else(|| {
                WorkflowError::UnknownDependency(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, dep
                ))
            })?;
            graph.add_edge(node_indices[*from_idx], node_indices[to_idx], ());
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving task '{node_id}'"))
    })?;

    let mut depths: HashMap<&str, usize> = HashMap::new();
    for &node_idx in &sorted {
        let task_id = graph[node_idx];
        let task = id_to_task[task_id];
        let depth = if task.dependencies.is_empty() {
            0
        } else {
            task.dependencies
                .iter()
                .map(|dep| depths.get(dep.as_str()).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0)
        };
        depths.insert(task_id, depth);
    }

    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<&Task>> = vec![vec![]; max_depth + 1];
    for task in tasks {
        let depth = depths[task.id.as_str()];
        layers[depth].push(task);
    }

    Ok(layers)
}

// ---------------------------------------------------------------------------
// DAG validation (lighter weight, no layer computation)
// ---------------------------------------------------------------------------

/// Validate that tasks form a valid DAG (no cycles, all references exist).
pub fn validate_dag(tasks: &[Task]) -> Result<(), WorkflowError> {
    let id_to_idx: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = tasks.iter().map(|t| graph.add_node(t.id.as_str())).collect();

    for task in tasks {
        let to_idx = id_to_idx[task.id.as_str()];
        for dep in &task.dependencies {
            let from_idx = id_to_idx.get(dep.as_str()).ok_or_else(|| {
                WorkflowError::UnknownDependency(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, dep
                ))
            })?;
            graph.add_edge(node_indices[*from_idx], node_indices[to_idx], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving task '{node_id}'"))
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Transitive dependency closure
// ---------------------------------------------------------------------------

/// Returns the transitive closure of all dependencies for a given task.
///
/// If `task_id` is not found, returns an empty vec.
pub fn get_task_dependencies<'a>(task_id: &str, tasks: &'a [Task]) -> Vec<&'a str> {
    let task_map: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut visited = std::collections::HashSet::new();
    let mut stack = vec![task_id];

    while let Some(current) = stack.pop() {
        if let Some(task) = task_map.get(current) {
            for dep in &task.dependencies {
                if visited.insert(dep.as_str()) {
                    stack.push(dep.as_str());
                }
            }
        }
    }

    visited.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
