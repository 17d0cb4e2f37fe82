//! The abstract state-store port.
//!
//! `StateStore` is the only surface external persistence backends implement. The engine
//! never assumes transactional semantics beyond atomicity of a single `save_state` call
//! for one `(workflow_id, run_id)` key; implementations MAY compress, shard, or split the
//! record on disk as long as `save_state` then `load_state` round-trips the value.
//!
//! Concrete backends (filesystem, SQL, ...) are external collaborators and out of scope
//! for this crate; [`crate::memory::InMemoryStateStore`] is the only implementation
//! shipped here, intended for tests and single-process development use.

use async_trait::async_trait;

use crate::error::Result;
use crate::journal::TrackingData;

/// Persistence contract for workflow run history.
///
/// # Atomicity
///
/// `save_state` MUST be atomic for a given `(workflow_id, run_id)` key: a concurrent or
/// crashing writer must never leave a partially-written record observable to
/// `load_state`. The canonical implementation technique is write-then-rename for
/// filesystem backends, or a single-row upsert for SQL backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Atomically replaces the entire tracking record for `(workflow_id, run_id)`.
    async fn save_state(
        &self,
        workflow_id: &str,
        run_id: &str,
        tracking_data: &TrackingData,
    ) -> Result<()>;

    /// Loads the tracking record for `(workflow_id, run_id)`, or `None` if absent.
    async fn load_state(&self, workflow_id: &str, run_id: &str) -> Result<Option<TrackingData>>;

    /// All run ids known for `workflow_id`. Newest-first ordering is recommended but not
    /// required.
    async fn list_runs(&self, workflow_id: &str) -> Result<Vec<String>>;

    /// All workflow ids the store has ever seen a run for.
    async fn list_workflows(&self) -> Result<Vec<String>>;
}
