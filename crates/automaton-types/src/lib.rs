//! Shared domain types for the automation execution core.
//!
//! This crate contains the data model shared by the workflow engine, sandbox
//! executor, permission manager, and rollback manager: workflow/task
//! definitions, sandbox execution results and resource limits, permission
//! rules and audit records, rollback points and transactions, the lifecycle
//! event enum, and process configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! serde_yaml_ng, schemars.

pub mod config;
pub mod event;
pub mod execution;
pub mod permission;
pub mod rollback;
pub mod workflow;
