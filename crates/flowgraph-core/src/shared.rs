//! Workflow-local shared state and the `request_input` capability.
//!
//! [`SharedState`] is the untyped, JSON-equivalent map every node reads in `prepare` and
//! writes in `cleanup`. [`InputBroker`] is handed to `prepare` and implements the
//! cooperative-suspension contract: it consumes a matching entry from the current
//! step's input pool if one is present, otherwise it hands back the [`InputRequest`]
//! that the engine must persist and suspend on.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use flowgraph_journal::InputRequest;

/// The workflow-local mutable map. Values may be any JSON-equivalent data; the engine
/// does not constrain value types beyond the state store's round-trip guarantee.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    map: Map<String, Value>,
}

impl SharedState {
    /// Builds shared state from a JSON value. `Value::Null` becomes an empty map; any
    /// other non-object value is an error, since shared state is always keyed.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self { map: Map::new() }),
            Value::Object(map) => Ok(Self { map }),
            other => Err(format!("initial_shared must be a JSON object, got {other}")),
        }
    }

    /// An empty shared state.
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    /// Reads a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Writes a key. Only valid to call during a node's `cleanup` phase; the engine
    /// does not police this — it trusts well-behaved nodes.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.map.insert(key.into(), value);
    }

    /// Removes a key, returning its prior value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    /// A full snapshot as a JSON value, suitable for embedding in a [`flowgraph_journal::StepSnapshot`].
    pub fn to_value(&self) -> Value {
        Value::Object(self.map.clone())
    }

    /// Borrow the underlying map, e.g. for a condition evaluator.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }
}

/// Why a [`InputBroker::request_input`] call did not immediately return a value.
#[derive(Debug, Clone)]
pub enum Suspend {
    /// No matching entry in this step's input pool; the engine must persist this
    /// request and suspend the workflow.
    WaitingForInput(InputRequest),
    /// `request_input` was called outside engine-driven execution (the standalone
    /// node runner).
    Unavailable,
}

/// The `request_input` capability passed into a node's `prepare` phase.
///
/// Maintains, for the current step only, an input pool supplied by the caller of
/// `step()`/`run()`. A matching entry is consumed (removed) the first time it is
/// requested; unused entries are discarded at the end of the step.
pub struct InputBroker {
    node_id: String,
    pool: Mutex<HashMap<String, Value>>,
    unavailable: bool,
}

impl InputBroker {
    /// Constructs a broker backed by a live input pool for `node_id`.
    pub(crate) fn new(node_id: impl Into<String>, pool: HashMap<String, Value>) -> Self {
        Self {
            node_id: node_id.into(),
            pool: Mutex::new(pool),
            unavailable: false,
        }
    }

    /// Constructs a broker that always suspends as [`Suspend::Unavailable`], for the
    /// standalone node runner.
    pub(crate) fn unavailable(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            pool: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    /// How many pool entries went unconsumed this step. The engine logs this count and
    /// then drops the pool; inputs never carry over to the next step.
    pub(crate) async fn remaining_pool_size(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// Requests a value from the external caller.
    ///
    /// `request_id` defaults to this node's id when `None`. Returns
    /// `Ok(value)` immediately if the pool already holds a matching entry (it is
    /// consumed); otherwise returns [`Suspend::WaitingForInput`] with the request the
    /// engine must persist, or [`Suspend::Unavailable`] when called from the standalone
    /// runner.
    pub async fn request_input(
        &self,
        request_id: Option<&str>,
        prompt: Option<&str>,
        options: Option<Vec<Value>>,
        input_type: Option<&str>,
    ) -> Result<Value, Suspend> {
        if self.unavailable {
            return Err(Suspend::Unavailable);
        }
        let rid = request_id.unwrap_or(&self.node_id).to_string();
        {
            let mut pool = self.pool.lock().await;
            if let Some(value) = pool.remove(&rid) {
                return Ok(value);
            }
        }
        let mut req = InputRequest::new(&self.node_id).with_request_id(rid);
        if let Some(p) = prompt {
            req = req.with_prompt(p);
        }
        if let Some(opts) = options {
            req = req.with_options(opts);
        }
        if let Some(t) = input_type {
            req = req.with_input_type(t);
        }
        Err(Suspend::WaitingForInput(req))
    }
}
