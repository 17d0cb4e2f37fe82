//! Error types for journal and state-store operations.

use thiserror::Error;

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;

/// Errors raised by the [`crate::journal::Journal`] and by [`crate::store::StateStore`]
/// implementations.
#[derive(Error, Debug)]
pub enum JournalError {
    /// `append` was called with a step that does not equal the current journal length.
    #[error("append out of order: expected step {expected}, got {actual}")]
    AppendOutOfOrder {
        /// Step the journal expected (`len(steps)`).
        expected: u64,
        /// Step actually passed to `append`.
        actual: u64,
    },

    /// No run exists for the given `(workflow_id, run_id)`.
    #[error("no run found for workflow '{workflow_id}' run '{run_id}'")]
    UnknownRun {
        /// Workflow identifier.
        workflow_id: String,
        /// Run identifier.
        run_id: String,
    },

    /// `read(step)` or `resume_from(step)` referenced a step past the end of the journal.
    #[error("step {0} out of range")]
    UnknownStep(u64),

    /// The underlying state store failed.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// A snapshot or tracking record failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::store::StateStore`] implementations.
///
/// The port is deliberately opaque: concrete backends (filesystem, SQL, ...) fold their
/// own error causes into a single string. The engine never matches on the cause, only on
/// whether the call succeeded.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend failed to read or write a record.
    #[error("backend error: {0}")]
    Backend(String),
}
