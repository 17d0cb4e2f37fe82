//! Graph data model and validation.
//!
//! A [`Graph`] is pure data: node and edge definitions, the start node id, and the
//! initial shared state. It carries no executable node instances — those are built at
//! engine-construction time from a [`crate::registry::NodeRegistry`]. Keeping the
//! declarative graph separate from its compiled runtime is what lets a graph be
//! serialized, inspected, and reconstituted without touching any node implementation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::retry::RetryPolicy;

/// A vertex of the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    /// Unique id within the graph.
    pub id: String,
    /// Resolves to a factory via [`crate::registry::NodeRegistry`].
    pub class_name: String,
    /// Arbitrary, immutable-post-construction configuration handed to the node factory.
    #[serde(default)]
    pub config: Value,
    /// Maximum `execute` attempts. Must be `>= 1`; values below are clamped by
    /// [`RetryPolicy::new`].
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between `execute` attempts, in milliseconds (JSON has no native duration).
    #[serde(default)]
    pub retry_wait_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

impl NodeDef {
    /// Builds a `NodeDef` with default retry parameters (`max_retries = 1`, no wait).
    pub fn new(id: impl Into<String>, class_name: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            config,
            max_retries: default_max_retries(),
            retry_wait_ms: 0,
        }
    }

    /// Overrides the retry budget and inter-attempt delay.
    pub fn with_retry(mut self, max_retries: u32, retry_wait_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_wait_ms = retry_wait_ms;
        self
    }

    /// The retry policy this node was defined with.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            std::time::Duration::from_millis(self.retry_wait_ms),
        )
    }
}

/// A directed transition between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    /// Source node id.
    pub from_id: String,
    /// Target node id.
    pub to_id: String,
    /// Boolean expression over shared state. Empty string is the default edge; the
    /// literal `"True"` is always taken.
    #[serde(default)]
    pub condition: String,
}

impl EdgeDef {
    /// A default (unconditional fallback) edge.
    pub fn default_edge(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            condition: String::new(),
        }
    }

    /// An edge with a condition expression.
    pub fn conditional(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            condition: condition.into(),
        }
    }

    /// Whether this is the always-taken edge.
    pub fn is_always(&self) -> bool {
        self.condition == "True"
    }

    /// Whether this is the default/fallback edge (empty condition).
    pub fn is_default(&self) -> bool {
        self.condition.is_empty()
    }
}

/// The workflow definition: nodes, edges, start vertex, and initial shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Nodes, in declaration order (order matters for some diagnostics but not for
    /// transition tie-breaks, which key off edge declaration order instead).
    pub nodes: Vec<NodeDef>,
    /// Edges, in declaration order. Declaration order is load-bearing: it is the tie-
    /// break rule for the transition evaluator.
    pub edges: Vec<EdgeDef>,
    /// Entry point node id.
    pub start_id: String,
    /// Initial value of shared state at step 0.
    #[serde(default)]
    pub initial_shared: Value,
}

/// The self-contained, JSON-equivalent declarative form of a [`Graph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Entry point node id.
    pub start: String,
    /// Initial shared state; absent means an empty object.
    #[serde(default)]
    pub initial_state: Value,
    /// Node definitions.
    pub nodes: Vec<GraphDefinitionNode>,
    /// Edge definitions.
    #[serde(default)]
    pub edges: Vec<GraphDefinitionEdge>,
}

/// One entry of `GraphDefinition.nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinitionNode {
    /// Node id.
    pub id: String,
    /// Registered class name.
    pub class: String,
    /// Node configuration.
    #[serde(default)]
    pub config: Value,
    /// Retry budget; defaults to 1 (no retry) when absent.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Inter-attempt delay in milliseconds; defaults to 0 when absent.
    #[serde(default)]
    pub retry_wait_ms: u64,
}

/// One entry of `GraphDefinition.edges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinitionEdge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Condition expression; absent or empty means the default edge.
    #[serde(default)]
    pub condition: String,
}

impl Graph {
    /// Starts an empty, programmatically-built graph.
    pub fn new(start_id: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            start_id: start_id.into(),
            initial_shared: Value::Object(Default::default()),
        }
    }

    /// Adds a node, returning `self` for chaining.
    pub fn add_node(mut self, node: NodeDef) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge, returning `self` for chaining.
    pub fn add_edge(mut self, edge: EdgeDef) -> Self {
        self.edges.push(edge);
        self
    }

    /// Sets the initial shared state, returning `self` for chaining.
    pub fn with_initial_shared(mut self, initial_shared: Value) -> Self {
        self.initial_shared = initial_shared;
        self
    }

    /// Builds a `Graph` from its declarative JSON-equivalent form.
    pub fn from_definition(def: GraphDefinition) -> Self {
        Self {
            nodes: def
                .nodes
                .into_iter()
                .map(|n| NodeDef {
                    id: n.id,
                    class_name: n.class,
                    config: n.config,
                    max_retries: n.max_retries.max(1),
                    retry_wait_ms: n.retry_wait_ms,
                })
                .collect(),
            edges: def
                .edges
                .into_iter()
                .map(|e| EdgeDef {
                    from_id: e.from,
                    to_id: e.to,
                    condition: e.condition,
                })
                .collect(),
            start_id: def.start,
            initial_shared: def.initial_state,
        }
    }

    /// Node ids in declaration order. A read-only accessor for tooling built on top of
    /// the engine (e.g. a CLI that lists graph contents); not a visualization feature.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    /// Outgoing edges of `node_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a EdgeDef> {
        self.edges.iter().filter(move |e| e.from_id == node_id)
    }

    /// Looks up a node definition by id.
    pub fn node(&self, node_id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Validates graph-construction invariants:
    /// - node ids are unique
    /// - `start_id` references an existing node
    /// - every edge's `from_id`/`to_id` reference existing nodes
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(GraphError::Validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        if !seen.contains(self.start_id.as_str()) {
            return Err(GraphError::Validation(format!(
                "start node '{}' does not exist",
                self.start_id
            )));
        }

        for edge in &self.edges {
            if !seen.contains(edge.from_id.as_str()) {
                return Err(GraphError::Validation(format!(
                    "edge references unknown source node '{}'",
                    edge.from_id
                )));
            }
            if !seen.contains(edge.to_id.as_str()) {
                return Err(GraphError::Validation(format!(
                    "edge references unknown target node '{}'",
                    edge.to_id
                )));
            }
        }

        Ok(())
    }

    /// All node ids as an owned set, used by resume validation to check historical
    /// compatibility without borrowing `self` across an `await`.
    pub(crate) fn node_id_set(&self) -> HashSet<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }
}
