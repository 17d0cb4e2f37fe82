//! Node class registry.
//!
//! A [`NodeRegistry`] maps a string `class_name` to a factory so graphs can be
//! reconstituted from a serialized definition instead of wired up by hand. Registration
//! is expected to happen once per class at program init; lookup failure during graph
//! construction or resume surfaces [`GraphError::NodeClassNotRegistered`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::node::{Node, NodeFactory};
use crate::retry::RetryPolicy;

/// A mapping from `class_name` to the factory that builds instances of that class.
///
/// Unlike a process-wide global, a `NodeRegistry` is an ordinary value: tests can build
/// a fresh one per graph, and a hosting process can keep one long-lived registry shared
/// across every graph it compiles.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory under `class_name`, overwriting any previous registration.
    pub fn register(&mut self, class_name: impl Into<String>, factory: NodeFactory) {
        self.factories.insert(class_name.into(), factory);
    }

    /// Instantiates a node of `class_name`, or `NodeClassNotRegistered` if nothing was
    /// registered under that name.
    pub fn build(
        &self,
        class_name: &str,
        id: &str,
        config: Value,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn Node>> {
        let factory = self
            .factories
            .get(class_name)
            .ok_or_else(|| GraphError::NodeClassNotRegistered(class_name.to_string()))?;
        factory(id, config, retry)
    }

    /// Whether a class is registered, for pre-flight validation without constructing.
    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }
}
