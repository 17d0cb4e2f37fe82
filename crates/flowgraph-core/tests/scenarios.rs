//! End-to-end scenarios exercising suspend/resume, retries with fallback, and forking,
//! driven entirely through the public `flowgraph_core`/`flowgraph_journal` surface
//! against the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flowgraph_core::{
    EdgeDef, Engine, ExecError, Graph, InMemoryStateStore, InputBroker, Node, NodeDef, NodeRegistry,
    PrepareOutcome, Result, ResumeOptions, SharedState, Suspend, WorkflowStatus,
};
use serde_json::{json, Value};

/// Adds `config.amount` (default 1) to `shared["x"]` (default 0) during `cleanup`.
struct AddToX {
    amount: i64,
}

#[async_trait]
impl Node for AddToX {
    async fn prepare(&self, shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        let x = shared.get("x").and_then(Value::as_i64).unwrap_or(0);
        Ok(PrepareOutcome::Ready(json!(x)))
    }

    async fn execute(&self, prepared: Value) -> std::result::Result<Value, ExecError> {
        Ok(json!(prepared.as_i64().unwrap_or(0) + self.amount))
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("x", result);
        Ok(())
    }
}

fn add_to_x_factory(amount: i64) -> flowgraph_core::NodeFactory {
    Arc::new(move |_id, _config, _retry| Ok(Arc::new(AddToX { amount }) as Arc<dyn Node>))
}

/// Marks `shared["done"] = true`.
struct MarkDone;

#[async_trait]
impl Node for MarkDone {
    async fn prepare(&self, _shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        Ok(PrepareOutcome::Ready(Value::Null))
    }

    async fn execute(&self, _prepared: Value) -> std::result::Result<Value, ExecError> {
        Ok(Value::Null)
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, _result: Value) -> Result<()> {
        shared.set("done", json!(true));
        Ok(())
    }
}

fn registry_s1() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register("add1", add_to_x_factory(1));
    registry.register("mark_done", Arc::new(|_id, _config, _retry| Ok(Arc::new(MarkDone) as Arc<dyn Node>)));
    registry
}

fn linear_abc_graph() -> Graph {
    Graph::new("a")
        .add_node(NodeDef::new("a", "add1", Value::Null))
        .add_node(NodeDef::new("b", "add1", Value::Null))
        .add_node(NodeDef::new("c", "mark_done", Value::Null))
        .add_edge(EdgeDef::default_edge("a", "b"))
        .add_edge(EdgeDef::default_edge("b", "c"))
        .with_initial_shared(json!({"x": 0}))
}

#[tokio::test]
async fn s1_linear_completion() {
    let graph = linear_abc_graph();
    let registry = registry_s1();
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());

    let mut engine = Engine::new(graph, &registry, store, "wf-s1", "run-1").await.unwrap();
    let (continuing, tracking) = engine.run(Default::default()).await.unwrap();

    assert!(!continuing);
    assert_eq!(tracking.steps.len(), 4, "step 0 init + A, B, C");
    let last = tracking.steps.last().unwrap();
    assert_eq!(last.shared, json!({"x": 2, "done": true}));
    assert_eq!(last.workflow_status, WorkflowStatus::Completed);
}

/// `prepare` copies `shared["seed"]` into `x`; used for the branch scenario.
struct SeedX;

#[async_trait]
impl Node for SeedX {
    async fn prepare(&self, shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        Ok(PrepareOutcome::Ready(shared.get("seed").cloned().unwrap_or(json!(0))))
    }

    async fn execute(&self, prepared: Value) -> std::result::Result<Value, ExecError> {
        Ok(prepared)
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("x", result);
        Ok(())
    }
}

fn branch_graph() -> (Graph, NodeRegistry) {
    let mut registry = NodeRegistry::new();
    registry.register("seed_x", Arc::new(|_id, _config, _retry| Ok(Arc::new(SeedX) as Arc<dyn Node>)));
    registry.register("mark_done", Arc::new(|_id, _config, _retry| Ok(Arc::new(MarkDone) as Arc<dyn Node>)));

    let graph = Graph::new("a")
        .add_node(NodeDef::new("a", "seed_x", Value::Null))
        .add_node(NodeDef::new("p", "mark_done", Value::Null))
        .add_node(NodeDef::new("n", "mark_done", Value::Null))
        .add_edge(EdgeDef::conditional("a", "p", "shared['x'] > 0"))
        .add_edge(EdgeDef::default_edge("a", "n"));
    (graph, registry)
}

#[tokio::test]
async fn s2_conditional_branch_positive() {
    let (graph, registry) = branch_graph();
    let graph = graph.with_initial_shared(json!({"seed": 5}));
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s2", "run-pos").await.unwrap();
    let (_, tracking) = engine.run(Default::default()).await.unwrap();
    assert_eq!(tracking.steps.last().unwrap().previous_node_id.as_deref(), Some("p"));
}

#[tokio::test]
async fn s2_conditional_branch_negative() {
    let (graph, registry) = branch_graph();
    let graph = graph.with_initial_shared(json!({"seed": -1}));
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s2", "run-neg").await.unwrap();
    let (_, tracking) = engine.run(Default::default()).await.unwrap();
    assert_eq!(tracking.steps.last().unwrap().previous_node_id.as_deref(), Some("n"));
}

/// Requests input under `request_id = "q1"`, then writes the answer to `shared["answer"]`.
struct AskQuestion;

#[async_trait]
impl Node for AskQuestion {
    async fn prepare(&self, _shared: &SharedState, input: &InputBroker) -> Result<PrepareOutcome> {
        match input.request_input(Some("q1"), Some("what is it?"), None, None).await {
            Ok(value) => Ok(PrepareOutcome::Ready(value)),
            Err(Suspend::WaitingForInput(req)) => Ok(PrepareOutcome::Suspended(req)),
            Err(Suspend::Unavailable) => unreachable!("engine-driven execution always provides a broker"),
        }
    }

    async fn execute(&self, prepared: Value) -> std::result::Result<Value, ExecError> {
        Ok(prepared)
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("answer", result);
        Ok(())
    }
}

fn human_in_loop_graph() -> (Graph, NodeRegistry) {
    let mut registry = NodeRegistry::new();
    registry.register("ask", Arc::new(|_id, _config, _retry| Ok(Arc::new(AskQuestion) as Arc<dyn Node>)));
    registry.register("mark_done", Arc::new(|_id, _config, _retry| Ok(Arc::new(MarkDone) as Arc<dyn Node>)));

    let graph = Graph::new("q")
        .add_node(NodeDef::new("q", "ask", Value::Null))
        .add_node(NodeDef::new("r", "mark_done", Value::Null))
        .add_edge(EdgeDef::default_edge("q", "r"));
    (graph, registry)
}

#[tokio::test]
async fn s3_human_in_the_loop() {
    let (graph, registry) = human_in_loop_graph();
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s3", "run-1").await.unwrap();

    let (continuing, tracking) = engine.run(Default::default()).await.unwrap();
    assert!(continuing);
    let waiting = tracking.steps.last().unwrap();
    assert_eq!(waiting.workflow_status, WorkflowStatus::WaitingForInput);
    assert_eq!(waiting.awaiting_input.as_ref().unwrap().request_id, "q1");

    let mut pool = std::collections::HashMap::new();
    pool.insert("q1".to_string(), json!("42"));
    let (continuing, tracking) = engine.run(pool).await.unwrap();
    assert!(!continuing);
    assert_eq!(tracking.steps.last().unwrap().shared, json!({"answer": "42"}));
}

#[tokio::test]
async fn s4_fork_and_diverge() {
    let graph = linear_abc_graph();
    let registry = registry_s1();
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());

    let mut parent = Engine::new(graph.clone(), &registry, store.clone(), "wf-s4", "parent")
        .await
        .unwrap();
    parent.run(Default::default()).await.unwrap();
    let parent_tracking = parent.tracking_data().clone();
    assert_eq!(parent_tracking.steps.last().unwrap().shared, json!({"x": 2, "done": true}));

    // Fork from step 1 (right after A ran) with a patched B that multiplies by 10
    // instead of adding 1.
    let mut fork_registry = NodeRegistry::new();
    fork_registry.register("add1", add_to_x_factory(1));
    fork_registry.register("mark_done", Arc::new(|_id, _config, _retry| Ok(Arc::new(MarkDone) as Arc<dyn Node>)));
    fork_registry.register(
        "mul10",
        Arc::new(|_id, _config, _retry| Ok(Arc::new(MulX { factor: 10 }) as Arc<dyn Node>)),
    );
    let mut patched_graph = graph.clone();
    patched_graph.nodes[1].class_name = "mul10".to_string();

    let forked = Engine::resume(
        patched_graph,
        &fork_registry,
        store.clone(),
        "wf-s4",
        "parent",
        ResumeOptions {
            resume_from: Some(1),
            fork: true,
        },
    )
    .await;
    let mut forked = forked.unwrap();
    let (_, fork_tracking) = forked.run(Default::default()).await.unwrap();

    assert_eq!(fork_tracking.steps.last().unwrap().shared, json!({"x": 10, "done": true}));

    // Parent journal on the store is untouched.
    let reloaded_parent = store.load_state("wf-s4", "parent").await.unwrap().unwrap();
    assert_eq!(reloaded_parent.steps.last().unwrap().shared, json!({"x": 2, "done": true}));
    assert_ne!(forked.run_id(), "parent");
}

struct MulX {
    factor: i64,
}

#[async_trait]
impl Node for MulX {
    async fn prepare(&self, shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        let x = shared.get("x").and_then(Value::as_i64).unwrap_or(0);
        Ok(PrepareOutcome::Ready(json!(x)))
    }

    async fn execute(&self, prepared: Value) -> std::result::Result<Value, ExecError> {
        Ok(json!(prepared.as_i64().unwrap_or(0) * self.factor))
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("x", result);
        Ok(())
    }
}

/// Fails on its first two `execute` attempts, then succeeds with `7` on the third.
struct FlakyThenSeven {
    attempts: AtomicU32,
}

#[async_trait]
impl Node for FlakyThenSeven {
    async fn prepare(&self, _shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        Ok(PrepareOutcome::Ready(Value::Null))
    }

    async fn execute(&self, _prepared: Value) -> std::result::Result<Value, ExecError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err("transient failure".into())
        } else {
            Ok(json!(7))
        }
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("x", result);
        Ok(())
    }
}

/// Always fails `execute`; `exec_fallback` substitutes `{"ok": false}`.
struct AlwaysFailsWithFallback;

#[async_trait]
impl Node for AlwaysFailsWithFallback {
    async fn prepare(&self, _shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        Ok(PrepareOutcome::Ready(Value::Null))
    }

    async fn execute(&self, _prepared: Value) -> std::result::Result<Value, ExecError> {
        Err("permanent failure".into())
    }

    async fn cleanup(&self, shared: &mut SharedState, _prepared: Value, result: Value) -> Result<()> {
        shared.set("result", result);
        Ok(())
    }

    async fn exec_fallback(&self, _prepared: Value, _error: &ExecError) -> Option<Value> {
        Some(json!({"ok": false}))
    }
}

/// Always fails `execute` with no fallback.
struct AlwaysFailsNoFallback;

#[async_trait]
impl Node for AlwaysFailsNoFallback {
    async fn prepare(&self, _shared: &SharedState, _input: &InputBroker) -> Result<PrepareOutcome> {
        Ok(PrepareOutcome::Ready(Value::Null))
    }

    async fn execute(&self, _prepared: Value) -> std::result::Result<Value, ExecError> {
        Err("permanent failure".into())
    }

    async fn cleanup(&self, _shared: &mut SharedState, _prepared: Value, _result: Value) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn s5_retry_then_success() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "flaky",
        Arc::new(|_id, _config, _retry| {
            Ok(Arc::new(FlakyThenSeven { attempts: AtomicU32::new(0) }) as Arc<dyn Node>)
        }),
    );
    let graph = Graph::new("f").add_node(NodeDef::new("f", "flaky", Value::Null).with_retry(3, 0));
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s5a", "run-1").await.unwrap();
    let (continuing, tracking) = engine.run(Default::default()).await.unwrap();
    assert!(!continuing);
    assert_eq!(tracking.steps.len(), 2);
    assert_eq!(tracking.steps[1].workflow_status, WorkflowStatus::Completed);
    assert_eq!(tracking.steps[1].shared, json!({"x": 7}));
}

#[tokio::test]
async fn s5_retry_exhausted_with_fallback() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "always_fails_fallback",
        Arc::new(|_id, _config, _retry| Ok(Arc::new(AlwaysFailsWithFallback) as Arc<dyn Node>)),
    );
    let graph = Graph::new("f")
        .add_node(NodeDef::new("f", "always_fails_fallback", Value::Null).with_retry(3, 0));
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s5b", "run-1").await.unwrap();
    let (continuing, tracking) = engine.run(Default::default()).await.unwrap();
    assert!(!continuing);
    assert_eq!(tracking.steps.last().unwrap().workflow_status, WorkflowStatus::Completed);
    assert_eq!(tracking.steps.last().unwrap().shared, json!({"result": {"ok": false}}));
}

#[tokio::test]
async fn s5_retry_exhausted_without_fallback_fails_workflow() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "always_fails",
        Arc::new(|_id, _config, _retry| Ok(Arc::new(AlwaysFailsNoFallback) as Arc<dyn Node>)),
    );
    let graph = Graph::new("f").add_node(NodeDef::new("f", "always_fails", Value::Null).with_retry(3, 0));
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());
    let mut engine = Engine::new(graph, &registry, store, "wf-s5c", "run-1").await.unwrap();
    let err = engine.run(Default::default()).await.unwrap_err();
    assert!(matches!(err, flowgraph_core::GraphError::NodeExecution { .. }));
    assert_eq!(engine.execution_state().workflow_status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn s6_resume_after_crash() {
    let graph = linear_abc_graph();
    let registry = registry_s1();
    let store: Arc<dyn flowgraph_core::StateStore> = Arc::new(InMemoryStateStore::new());

    {
        let mut engine = Engine::new(graph.clone(), &registry, store.clone(), "wf-s6", "run-1")
            .await
            .unwrap();
        engine.step(Default::default()).await.unwrap(); // runs A
        engine.step(Default::default()).await.unwrap(); // runs B
        assert_eq!(engine.tracking_data().steps.len(), 3);
        // engine dropped here, simulating a crash
    }

    let mut resumed = Engine::resume(
        graph,
        &registry,
        store,
        "wf-s6",
        "run-1",
        ResumeOptions::default(),
    )
    .await
    .unwrap();
    let (continuing, tracking) = resumed.step(Default::default()).await.unwrap(); // runs C
    assert!(!continuing);
    assert_eq!(tracking.steps.len(), 4);
    assert_eq!(tracking.steps.last().unwrap().workflow_status, WorkflowStatus::Completed);
    assert_eq!(tracking.steps.last().unwrap().shared, json!({"x": 2, "done": true}));
}
