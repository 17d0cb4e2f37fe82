//! The execution engine: orchestrates stepwise and run-to-completion execution,
//! and owns the step counter and per-step snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use flowgraph_journal::{
    InputRequest, Journal, NodeStatus, StateStore, StepMetadata, StepSnapshot, TrackingData,
    WorkflowStatus,
};

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{Node, PrepareOutcome};
use crate::registry::NodeRegistry;
use crate::shared::{InputBroker, SharedState};
use crate::transition::evaluate_transition;

/// Options controlling how [`Engine::resume`] rebuilds a run from its journal.
#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    /// Truncate history to this step before resuming. Defaults to the latest step.
    pub resume_from: Option<u64>,
    /// When `true`, allocate a new `run_id` and copy the truncated history under it,
    /// tagged with `forked_from`, leaving the original run untouched.
    pub fork: bool,
}

/// Orchestrates execution of one `(workflow_id, run_id)`.
///
/// The engine exclusively owns the live [`SharedState`] and step counter while a step is
/// in progress; the [`Journal`] it holds exclusively owns the snapshot sequence.
pub struct Engine {
    graph: Graph,
    nodes: HashMap<String, Arc<dyn Node>>,
    store: Arc<dyn StateStore>,
    journal: Journal,
    shared: SharedState,
    next_node_id: Option<String>,
    node_statuses: HashMap<String, NodeStatus>,
}

impl Engine {
    /// Starts a brand-new run: validates the graph, instantiates every node via
    /// `registry`, and persists the step-0 snapshot.
    pub async fn new(
        graph: Graph,
        registry: &NodeRegistry,
        store: Arc<dyn StateStore>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Result<Engine> {
        graph.validate()?;
        let nodes = instantiate_nodes(&graph, registry)?;

        let workflow_id = workflow_id.into();
        let run_id = run_id.into();
        let shared = SharedState::from_value(graph.initial_shared.clone())
            .map_err(GraphError::Validation)?;
        let start_id = graph.start_id.clone();

        let mut journal = Journal::new(workflow_id, run_id);
        let snapshot = StepSnapshot::initial(shared.to_value(), &start_id);
        journal.append(snapshot)?;
        store
            .save_state(journal.workflow_id(), journal.run_id(), journal.tracking_data())
            .await?;

        tracing::info!(
            workflow_id = journal.workflow_id(),
            run_id = journal.run_id(),
            start = %start_id,
            "engine: started new run"
        );

        Ok(Engine {
            graph,
            nodes,
            store,
            journal,
            shared,
            next_node_id: Some(start_id),
            node_statuses: HashMap::new(),
        })
    }

    /// Reconstructs an engine from a previously persisted run, optionally truncating to
    /// `resume_from` and/or forking a new run id.
    ///
    /// Validates that every node referenced by history up to the resume point still
    /// exists in `graph`, failing with [`GraphError::IncompatibleGraph`] otherwise.
    pub async fn resume(
        graph: Graph,
        registry: &NodeRegistry,
        store: Arc<dyn StateStore>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        options: ResumeOptions,
    ) -> Result<Engine> {
        graph.validate()?;
        let nodes = instantiate_nodes(&graph, registry)?;

        let workflow_id = workflow_id.into();
        let run_id = run_id.into();

        let data = store
            .load_state(&workflow_id, &run_id)
            .await?
            .ok_or_else(|| {
                GraphError::Journal(flowgraph_journal::JournalError::UnknownRun {
                    workflow_id: workflow_id.clone(),
                    run_id: run_id.clone(),
                })
            })?;

        let mut journal = Journal::from_tracking_data(data);
        let resume_from = options
            .resume_from
            .unwrap_or_else(|| journal.next_step().saturating_sub(1));
        journal.truncate(resume_from);

        validate_compatible(&graph, &journal, resume_from)?;

        let journal = if options.fork {
            let new_run_id = uuid::Uuid::new_v4().to_string();
            let forked = journal.fork(new_run_id, resume_from)?;
            store
                .save_state(forked.workflow_id(), forked.run_id(), forked.tracking_data())
                .await?;
            tracing::info!(
                workflow_id = forked.workflow_id(),
                parent_run_id = %journal.run_id(),
                new_run_id = forked.run_id(),
                resume_from,
                "engine: forked run"
            );
            forked
        } else {
            tracing::info!(
                workflow_id = %workflow_id,
                run_id = %run_id,
                resume_from,
                "engine: resuming run"
            );
            journal
        };

        let (shared_value, next_node_id) = journal.resume_from(resume_from)?;
        let shared = SharedState::from_value(shared_value).map_err(GraphError::Validation)?;
        let node_statuses = journal.read(resume_from)?.node_statuses.clone();

        Ok(Engine {
            graph,
            nodes,
            store,
            journal,
            shared,
            next_node_id,
            node_statuses,
        })
    }

    /// The most recently persisted snapshot.
    pub fn execution_state(&self) -> &StepSnapshot {
        self.journal
            .latest()
            .expect("journal always holds at least the step-0 snapshot")
    }

    /// The full persisted record for this run.
    pub fn tracking_data(&self) -> &TrackingData {
        self.journal.tracking_data()
    }

    /// This run's id.
    pub fn run_id(&self) -> &str {
        self.journal.run_id()
    }

    /// Advances exactly one node.
    ///
    /// Returns `(continuing, tracking_data)`: `continuing` is `false` when the workflow
    /// just reached `Completed` or `Failed`, `true` otherwise (including when it just
    /// suspended waiting for input).
    pub async fn step(&mut self, input_pool: HashMap<String, Value>) -> Result<(bool, TrackingData)> {
        let node_id = match self.next_node_id.clone() {
            Some(id) => id,
            None => return Ok((false, self.journal.tracking_data().clone())),
        };

        let node = self
            .nodes
            .get(&node_id)
            .cloned()
            .expect("graph validation guarantees every next_node_id resolves to a node");

        let broker = InputBroker::new(node_id.clone(), input_pool);

        let prepared = match node.prepare(&self.shared, &broker).await {
            Ok(PrepareOutcome::Ready(value)) => {
                let discarded = broker.remaining_pool_size().await;
                if discarded > 0 {
                    tracing::debug!(node = %node_id, discarded, "engine: dropping unconsumed input pool entries");
                }
                value
            }
            Ok(PrepareOutcome::Suspended(request)) => {
                return self.finish_waiting(&node_id, request).await;
            }
            Err(error) => {
                return self.finish_failed(&node_id, error).await;
            }
        };

        let node_def = self
            .graph
            .node(&node_id)
            .expect("graph validation guarantees the running node has a NodeDef");
        let policy = node_def.retry_policy();

        let mut attempt = 0u32;
        let mut last_error = None;
        let mut outcome = None;
        while policy.should_retry(attempt) {
            match node.execute(prepared.clone()).await {
                Ok(value) => {
                    outcome = Some(value);
                    break;
                }
                Err(error) => {
                    tracing::warn!(node = %node_id, attempt, error = %error, "engine: execute attempt failed");
                    last_error = Some(error);
                    attempt += 1;
                    if policy.should_retry(attempt) && !policy.retry_wait.is_zero() {
                        tokio::time::sleep(policy.retry_wait).await;
                    }
                }
            }
        }

        let result = match outcome {
            Some(value) => value,
            None => {
                let error = last_error.expect("loop always attempts at least once");
                match node.exec_fallback(prepared.clone(), &error).await {
                    Some(fallback) => fallback,
                    None => {
                        let error = GraphError::NodeExecution {
                            node: node_id.clone(),
                            error: error.to_string(),
                        };
                        return self.finish_failed(&node_id, error).await;
                    }
                }
            }
        };

        if let Err(error) = node.cleanup(&mut self.shared, prepared, result).await {
            return self.finish_failed(&node_id, error).await;
        }

        match evaluate_transition(&self.graph, &node_id, &self.shared) {
            Ok(next) => self.finish_completed(&node_id, next).await,
            Err(error) => self.finish_failed(&node_id, error).await,
        }
    }

    /// Runs `step` repeatedly until the workflow is no longer continuing, or until a
    /// step suspends waiting for input.
    ///
    /// The same `input_pool` is offered to every step invoked within this call; each
    /// step's broker independently tracks which entries it has consumed.
    pub async fn run(&mut self, input_pool: HashMap<String, Value>) -> Result<(bool, TrackingData)> {
        loop {
            let (continuing, tracking) = self.step(input_pool.clone()).await?;
            if !continuing || self.execution_state().workflow_status == WorkflowStatus::WaitingForInput {
                return Ok((continuing, tracking));
            }
        }
    }

    async fn persist(&mut self, snapshot: StepSnapshot) -> Result<()> {
        self.journal.append(snapshot)?;
        self.store
            .save_state(
                self.journal.workflow_id(),
                self.journal.run_id(),
                self.journal.tracking_data(),
            )
            .await?;
        Ok(())
    }

    async fn finish_waiting(
        &mut self,
        node_id: &str,
        request: InputRequest,
    ) -> Result<(bool, TrackingData)> {
        self.node_statuses.insert(
            node_id.to_string(),
            NodeStatus::WaitingForInput {
                request: request.clone(),
            },
        );
        // A waiting node must be retried from the top on the next step; it stays the
        // node to run next.
        self.next_node_id = Some(node_id.to_string());
        let snapshot = StepSnapshot {
            step: self.journal.next_step(),
            shared: self.shared.to_value(),
            previous_node_id: Some(node_id.to_string()),
            next_node_id: self.next_node_id.clone(),
            workflow_status: WorkflowStatus::WaitingForInput,
            node_statuses: self.node_statuses.clone(),
            awaiting_input: Some(request),
            metadata: StepMetadata {
                step: self.journal.next_step(),
                error: None,
                forked_from: None,
            },
        };
        self.persist(snapshot).await?;
        Ok((true, self.journal.tracking_data().clone()))
    }

    async fn finish_completed(
        &mut self,
        node_id: &str,
        next: Option<String>,
    ) -> Result<(bool, TrackingData)> {
        self.node_statuses
            .insert(node_id.to_string(), NodeStatus::Completed);
        self.next_node_id = next.clone();
        let status = if next.is_some() {
            WorkflowStatus::Healthy
        } else {
            WorkflowStatus::Completed
        };
        let snapshot = StepSnapshot {
            step: self.journal.next_step(),
            shared: self.shared.to_value(),
            previous_node_id: Some(node_id.to_string()),
            next_node_id: next.clone(),
            workflow_status: status,
            node_statuses: self.node_statuses.clone(),
            awaiting_input: None,
            metadata: StepMetadata {
                step: self.journal.next_step(),
                error: None,
                forked_from: None,
            },
        };
        self.persist(snapshot).await?;
        Ok((next.is_some(), self.journal.tracking_data().clone()))
    }

    async fn finish_failed(&mut self, node_id: &str, error: GraphError) -> Result<(bool, TrackingData)> {
        let reason = error.to_string();
        self.node_statuses.insert(
            node_id.to_string(),
            NodeStatus::Failed {
                reason: reason.clone(),
            },
        );
        self.next_node_id = None;
        let snapshot = StepSnapshot {
            step: self.journal.next_step(),
            shared: self.shared.to_value(),
            previous_node_id: Some(node_id.to_string()),
            next_node_id: None,
            workflow_status: WorkflowStatus::Failed,
            node_statuses: self.node_statuses.clone(),
            awaiting_input: None,
            metadata: StepMetadata {
                step: self.journal.next_step(),
                error: Some(reason),
                forked_from: None,
            },
        };
        self.persist(snapshot).await?;
        Err(error)
    }
}

fn instantiate_nodes(graph: &Graph, registry: &NodeRegistry) -> Result<HashMap<String, Arc<dyn Node>>> {
    let mut nodes = HashMap::with_capacity(graph.nodes.len());
    for def in &graph.nodes {
        let node = registry.build(&def.class_name, &def.id, def.config.clone(), def.retry_policy())?;
        nodes.insert(def.id.clone(), node);
    }
    Ok(nodes)
}

/// Deep resume validation: every node id referenced by a non-`Pending` status at or
/// before `resume_from`, and the `next_node_id` at the resume point, must exist in
/// `graph`.
fn validate_compatible(graph: &Graph, journal: &Journal, resume_from: u64) -> Result<()> {
    let known = graph.node_id_set();
    for snapshot in journal.read_all().iter().take(resume_from as usize + 1) {
        for (node_id, status) in &snapshot.node_statuses {
            let relevant = matches!(
                status,
                NodeStatus::Completed | NodeStatus::Failed { .. } | NodeStatus::WaitingForInput { .. }
            );
            if relevant && !known.contains(node_id) {
                return Err(GraphError::IncompatibleGraph(format!(
                    "historical node '{node_id}' at step {} is missing from the current graph",
                    snapshot.step
                )));
            }
        }
    }
    if let Some(next) = &journal.read(resume_from)?.next_node_id {
        if !known.contains(next) {
            return Err(GraphError::IncompatibleGraph(format!(
                "next_node_id '{next}' at resume step {resume_from} is missing from the current graph"
            )));
        }
    }
    Ok(())
}
