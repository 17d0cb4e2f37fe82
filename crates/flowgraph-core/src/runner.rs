//! Standalone node runner: drives one node's full lifecycle against an ad-hoc shared
//! state, without an engine, a journal, or a graph.
//!
//! Intended for unit-testing a single node implementation in isolation. `request_input`
//! is never satisfiable here: well-behaved nodes map `Suspend::Unavailable` to
//! `GraphError::InputUnavailable` themselves; the runner also guards against a node that
//! returns `PrepareOutcome::Suspended` regardless.

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::node::{Node, PrepareOutcome};
use crate::retry::RetryPolicy;
use crate::shared::{InputBroker, SharedState};

/// Runs `node`'s full `prepare -> execute -> cleanup` lifecycle once, with `retry`
/// governing `execute` attempts, against `shared` (mutated in place by `cleanup`).
///
/// Returns the node's `execute` result (or `exec_fallback` substitute) on success.
pub async fn run_node(
    node_id: &str,
    node: &dyn Node,
    shared: &mut SharedState,
    retry: RetryPolicy,
) -> Result<Value> {
    let broker = InputBroker::unavailable(node_id);

    let prepared = match node.prepare(shared, &broker).await? {
        PrepareOutcome::Ready(value) => value,
        PrepareOutcome::Suspended(_) => {
            return Err(GraphError::InputUnavailable {
                node_id: node_id.to_string(),
            });
        }
    };

    let mut attempt = 0u32;
    let mut last_error = None;
    let mut outcome = None;
    while retry.should_retry(attempt) {
        match node.execute(prepared.clone()).await {
            Ok(value) => {
                outcome = Some(value);
                break;
            }
            Err(error) => {
                last_error = Some(error);
                attempt += 1;
                if retry.should_retry(attempt) && !retry.retry_wait.is_zero() {
                    tokio::time::sleep(retry.retry_wait).await;
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
                    return Err(GraphError::NodeExecution {
                        node: node_id.to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }
    };

    node.cleanup(shared, prepared, result.clone()).await?;
    Ok(result)
}
