//! The node lifecycle contract.
//!
//! Every node exposes three phases, invoked by the engine in order: `prepare` (reads
//! shared state, may solicit input), `execute` (pure-ish work, wrapped in retry logic,
//! no shared access), and `cleanup` (writes results back into shared state). A node
//! MUST NOT mutate shared state outside `cleanup`; the engine does not police this.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use flowgraph_journal::InputRequest;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::shared::{InputBroker, SharedState};

/// What `prepare` produced: either a value ready for `execute`, or a signal that this
/// node is suspended on an unsatisfied `request_input` call.
///
/// Implementations should model cooperative suspension as re-entrant: on resume,
/// `prepare` is invoked again from the top with the input pool pre-populated. Nodes
/// that must avoid duplicated side effects should perform them only after all of their
/// input requests have been satisfied.
#[derive(Debug)]
pub enum PrepareOutcome {
    /// `prepare` completed; `execute` may run against this value.
    Ready(Value),
    /// `prepare` suspended on an unsatisfied input request.
    Suspended(InputRequest),
}

/// An `execute` failure. Node authors return any `std::error::Error`; the engine only
/// needs its `Display` output to record in `NodeStatus::Failed`/snapshot metadata.
pub type ExecError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of work in the graph.
///
/// Node instances are shared by reference and carry no per-run mutable state — any
/// state a node needs across invocations belongs in `SharedState`, not in `Self`.
#[async_trait]
pub trait Node: Send + Sync {
    /// Reads shared state and may solicit external input. Returning
    /// `PrepareOutcome::Suspended` tells the engine to persist a `WaitingForInput`
    /// snapshot and return control to the caller.
    async fn prepare(&self, shared: &SharedState, input: &InputBroker) -> Result<PrepareOutcome>;

    /// Pure-ish work; no shared-state access. Wrapped in the node's retry policy by the
    /// engine.
    async fn execute(&self, prepared: Value) -> std::result::Result<Value, ExecError>;

    /// Writes results back into shared state. The only phase allowed to mutate shared
    /// state.
    async fn cleanup(&self, shared: &mut SharedState, prepared: Value, result: Value) -> Result<()>;

    /// Invoked once, after `execute` has exhausted its retry budget, with the prepared
    /// value and the final error. Its return value substitutes for `result` if
    /// provided; if `None` (the default), the step terminates `Failed`.
    async fn exec_fallback(&self, _prepared: Value, _error: &ExecError) -> Option<Value> {
        None
    }
}

/// Maps a `class_name` to a factory that reconstitutes a [`Node`] from its id, config,
/// and retry parameters.
pub type NodeFactory =
    Arc<dyn Fn(&str, Value, RetryPolicy) -> Result<Arc<dyn Node>> + Send + Sync>;
