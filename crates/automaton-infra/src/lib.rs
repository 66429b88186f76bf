//! Infrastructure layer for the automation execution core.
//!
//! Implements the OS/process-touching collaborators that `automaton-core`
//! depends on only as trait objects: the Docker/subprocess Sandbox Executor,
//! a line-delimited-JSON audit sink, and process configuration loading.

pub mod audit;
pub mod config;
pub mod sandbox;
