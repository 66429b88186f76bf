//! The durable audit sink port.
//!
//! `automaton-core` defines the contract; `automaton-infra` provides the
//! line-delimited-JSON file implementation. Kept as a trait (rather than a
//! concrete type) so tests can swap in an in-memory sink without touching
//! the filesystem.

use std::pin::Pin;

use automaton_types::permission::AuditRecord;
use thiserror::Error;

/// A boxed, owned future, the same manual async-trait-object pattern used by
/// the workflow engine's `TaskExecutor`.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink write failed: {0}")]
    WriteFailed(String),
}

/// Durable append-only sink for permission-decision audit records.
///
/// Per the ordering contract, a call to `write` must complete before the
/// gated action's caller observes the permission decision.
pub trait AuditSink: Send + Sync {
    fn write(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), AuditError>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// In-memory sink for unit tests; never touches the filesystem.
    #[derive(Default)]
    pub struct VecAuditSink {
        pub records: Mutex<Vec<AuditRecord>>,
    }

    impl AuditSink for VecAuditSink {
        fn write(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), AuditError>> {
            Box::pin(async move {
                self.records.lock().unwrap().push(record);
                Ok(())
            })
        }
    }
}
