//! # flowgraph-core — durable, resumable graph workflow execution
//!
//! A workflow is a directed graph whose vertices ("nodes") are user-defined units of
//! work and whose edges carry conditional transitions over a workflow-local shared
//! state. This crate is the execution engine: graph model and validation, the
//! node-lifecycle contract, per-step transition selection, cooperative input-request
//! suspension, stepwise / run-to-completion drivers, and resume-and-fork semantics.
//! Step-indexed history and the pluggable state-store contract live in the sibling
//! [`flowgraph_journal`] crate.
//!
//! ## Core concepts
//!
//! ### 1. Graph — the workflow definition
//!
//! [`graph::Graph`] is a plain-data vertex/edge set: [`graph::NodeDef`] ids resolve to
//! node instances via a [`registry::NodeRegistry`]; [`graph::EdgeDef`]s carry a
//! condition expression evaluated by [`transition`]. A graph can be built
//! programmatically or parsed from its JSON-equivalent [`graph::GraphDefinition`] form.
//!
//! ### 2. Node lifecycle
//!
//! Every [`node::Node`] exposes three phases invoked by the engine in order:
//! `prepare` (reads shared state, may request external input), `execute` (pure-ish
//! work, wrapped in retry/fallback discipline), `cleanup` (the only phase allowed to
//! write shared state). [`runner::run_node`] drives this lifecycle standalone, for unit
//! testing a node without an engine.
//!
//! ### 3. Execution engine
//!
//! [`engine::Engine`] advances one node per `step`, or loops to completion/suspension
//! with `run`. It owns the live [`shared::SharedState`] and step counter for the
//! duration of a step; the journal it holds owns the snapshot sequence.
//!
//! ### 4. Suspension and resume
//!
//! A node suspends by returning [`node::PrepareOutcome::Suspended`] from `prepare`,
//! handed to it via [`shared::InputBroker::request_input`]. The engine persists a
//! `WaitingForInput` snapshot and returns control to its caller; reconstructing an
//! engine with [`engine::ResumeOptions`] replays history from a chosen step, optionally
//! forking a new run id.

pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod shared;
pub mod transition;

pub use engine::{Engine, ResumeOptions};
pub use error::{GraphError, Result};
pub use graph::{EdgeDef, Graph, GraphDefinition, GraphDefinitionEdge, GraphDefinitionNode, NodeDef};
pub use node::{ExecError, Node, NodeFactory, PrepareOutcome};
pub use registry::NodeRegistry;
pub use retry::RetryPolicy;
pub use runner::run_node;
pub use shared::{InputBroker, SharedState, Suspend};
pub use transition::evaluate_transition;

pub use flowgraph_journal::{
    ForkPoint, InMemoryStateStore, InputRequest, JournalError, NodeStatus, StateStore, StepMetadata,
    StepSnapshot, TrackingData, WorkflowStatus,
};
