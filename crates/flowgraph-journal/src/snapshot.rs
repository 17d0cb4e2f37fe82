//! The canonical history record types: [`StepSnapshot`] and everything it is made of.
//!
//! A snapshot is produced exactly once per engine step and is never mutated afterwards.
//! Everything here is plain serializable data — no behavior lives in this module, only
//! the shapes that [`crate::journal::Journal`] stores and [`crate::store::StateStore`]
//! persists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-node execution status within a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Has not been scheduled yet.
    Pending,
    /// Selected to run on the next step but not yet started.
    Queued,
    /// Currently executing. Never persisted to a completed snapshot; present for
    /// completeness of the tagged variant.
    Running,
    /// Ran to completion and its `cleanup` phase wrote back to shared state.
    Completed,
    /// Exhausted retries (and fallback, if any) without producing a result.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
    /// Suspended inside `request_input` awaiting external input.
    WaitingForInput {
        /// The outstanding request.
        request: InputRequest,
    },
}

/// A single outstanding request for external input raised by a node's `prepare` phase.
///
/// `request_id` defaults to `node_id` when a node issues a single request. A node
/// issuing more than one request in the same `prepare` invocation MUST give each a
/// distinct `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    /// The node that raised the request.
    pub node_id: String,
    /// Identifier used to match a later input-pool entry to this request.
    pub request_id: String,
    /// Optional human-readable prompt.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prompt: Option<String>,
    /// Optional set of suggested/allowed options.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<Vec<Value>>,
    /// Optional free-form hint for how the caller should render the request
    /// (e.g. `"text"`, `"confirm"`, `"choice"`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_type: Option<String>,
}

impl InputRequest {
    /// Builds a request whose `request_id` defaults to `node_id`.
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            request_id: node_id.clone(),
            node_id,
            prompt: None,
            options: None,
            input_type: None,
        }
    }

    /// Overrides the `request_id`, for nodes issuing more than one request per step.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Attaches a human-readable prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Attaches suggested/allowed options.
    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Attaches an input-type hint for the caller's UI.
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }
}

/// Coarse-grained workflow status, carried on every [`StepSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Making progress; not waiting, not terminal.
    Healthy,
    /// Suspended on an unsatisfied `request_input` call.
    WaitingForInput,
    /// No outgoing transition was selected from the last completed node.
    Completed,
    /// A node exhausted retries/fallback, or transition evaluation raised an error.
    Failed,
}

/// `metadata` on a [`StepSnapshot`]: the step index plus optional diagnostic context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    /// Redundant with `StepSnapshot::step`, carried for convenience when the snapshot
    /// is extracted from its containing `Vec`.
    pub step: u64,
    /// Populated when `workflow_status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Populated on the first snapshot of a forked run.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub forked_from: Option<ForkPoint>,
}

/// Identifies the parent run and step a forked run was seeded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkPoint {
    /// The run this fork was copied from.
    pub parent_run_id: String,
    /// The last step copied from the parent (inclusive).
    pub step: u64,
}

/// The canonical, immutable history record: one per engine step.
///
/// `step` is monotonic and gapless within a run; `step == 0` is the post-init,
/// pre-execution snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Monotonic, zero-based step index.
    pub step: u64,
    /// Full snapshot of shared state as of the end of this step.
    pub shared: Value,
    /// The node that completed (or failed, or suspended) to produce this snapshot.
    /// `None` only for the step-0 initialization snapshot.
    pub previous_node_id: Option<String>,
    /// The node selected to run next. `None` when the workflow is terminal.
    pub next_node_id: Option<String>,
    /// Coarse workflow status.
    pub workflow_status: WorkflowStatus,
    /// Per-node status as of this step.
    pub node_statuses: HashMap<String, NodeStatus>,
    /// The outstanding input request, if `workflow_status == WaitingForInput`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub awaiting_input: Option<InputRequest>,
    /// Step index plus diagnostic context.
    pub metadata: StepMetadata,
}

impl StepSnapshot {
    /// The step-0 snapshot produced immediately after a graph is constructed, before
    /// any node has run.
    pub fn initial(shared: Value, start_id: &str) -> Self {
        Self {
            step: 0,
            shared,
            previous_node_id: None,
            next_node_id: Some(start_id.to_string()),
            workflow_status: WorkflowStatus::Healthy,
            node_statuses: HashMap::new(),
            awaiting_input: None,
            metadata: StepMetadata {
                step: 0,
                error: None,
                forked_from: None,
            },
        }
    }
}
