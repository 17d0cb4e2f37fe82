//! Error types for graph construction, validation, and execution.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation              - graph structure errors at construction time
//! ├── NodeClassNotRegistered  - registry lookup failure
//! ├── IncompatibleGraph       - resume against a graph missing historical nodes
//! ├── NodeExecution           - terminal node failure after retries/fallback
//! ├── ConditionError          - transition condition raised during evaluation
//! ├── InputUnavailable        - standalone runner hit request_input
//! ├── StepOrderingViolation   - internal invariant failure, fatal
//! └── Journal                 - wraps the persistence layer's own error
//! ```

use thiserror::Error;

/// Result type used throughout `flowgraph-core`.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building, validating, or executing a workflow.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure invalid: duplicate id, dangling edge, unresolved start node.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// A `NodeDef`'s `class_name` has no matching factory in the [`crate::registry::NodeRegistry`].
    #[error("node class not registered: {0}")]
    NodeClassNotRegistered(String),

    /// Resume was attempted against a graph that no longer contains a node referenced
    /// by history at or before the resume point.
    #[error("incompatible graph: {0}")]
    IncompatibleGraph(String),

    /// A node exhausted retries (and fallback, if any) without producing a result.
    #[error("node '{node}' execution failed: {error}")]
    NodeExecution {
        /// The node that failed.
        node: String,
        /// The underlying failure, as reported by the last `execute` attempt.
        error: String,
    },

    /// A transition condition raised while being evaluated against shared state.
    #[error("condition on edge '{from} -> {to}' failed: {error}")]
    ConditionError {
        /// Source node of the offending edge.
        from: String,
        /// Target node of the offending edge.
        to: String,
        /// The evaluator's error message.
        error: String,
    },

    /// [`crate::runner`] invoked `request_input` outside of engine-driven execution.
    #[error("request_input is unavailable outside engine-driven execution (node '{node_id}')")]
    InputUnavailable {
        /// The node that attempted to request input.
        node_id: String,
    },

    /// An internal sequencing invariant was violated (e.g. a step was about to be
    /// persisted out of order). This should never happen and is not recoverable by
    /// retrying; it indicates a bug in the engine itself.
    #[error("step ordering violation: {0}")]
    StepOrderingViolation(String),

    /// The persistence layer (journal or store) failed.
    #[error(transparent)]
    Journal(#[from] flowgraph_journal::JournalError),
}
