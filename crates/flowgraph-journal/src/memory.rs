//! In-memory reference [`StateStore`] implementation.
//!
//! Ephemeral, thread-safe, and ideal for tests and single-process development. Data is
//! lost on process exit; production deployments plug in a real [`StateStore`] backend
//! instead (filesystem, SQL, ...), which is out of scope for this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::journal::TrackingData;
use crate::store::StateStore;

type Key = (String, String);

/// Thread-safe, process-local [`StateStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    records: Arc<RwLock<HashMap<Key, TrackingData>>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of runs currently held, across all workflows. Test convenience only.
    pub async fn run_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Drops everything. Test convenience only.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save_state(
        &self,
        workflow_id: &str,
        run_id: &str,
        tracking_data: &TrackingData,
    ) -> Result<()> {
        let key = (workflow_id.to_string(), run_id.to_string());
        self.records.write().await.insert(key, tracking_data.clone());
        tracing::debug!(workflow_id, run_id, "in-memory store: saved state");
        Ok(())
    }

    async fn load_state(&self, workflow_id: &str, run_id: &str) -> Result<Option<TrackingData>> {
        let key = (workflow_id.to_string(), run_id.to_string());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn list_runs(&self, workflow_id: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        Ok(records
            .keys()
            .filter(|(wf, _)| wf == workflow_id)
            .map(|(_, run)| run.clone())
            .collect())
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut workflows: Vec<String> = records
            .keys()
            .map(|(wf, _)| wf.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        workflows.sort();
        Ok(workflows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_tracking_data() {
        let store = InMemoryStateStore::new();
        let data = TrackingData::new("wf-1", "run-1");
        store.save_state("wf-1", "run-1", &data).await.unwrap();

        let loaded = store.load_state("wf-1", "run-1").await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, data.workflow_id);
        assert_eq!(loaded.run_id, data.run_id);
        assert_eq!(loaded.steps.len(), data.steps.len());
    }

    #[tokio::test]
    async fn missing_run_is_none() {
        let store = InMemoryStateStore::new();
        assert!(store.load_state("wf-1", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_runs_and_workflows() {
        let store = InMemoryStateStore::new();
        store
            .save_state("wf-1", "run-a", &TrackingData::new("wf-1", "run-a"))
            .await
            .unwrap();
        store
            .save_state("wf-1", "run-b", &TrackingData::new("wf-1", "run-b"))
            .await
            .unwrap();
        store
            .save_state("wf-2", "run-c", &TrackingData::new("wf-2", "run-c"))
            .await
            .unwrap();

        let mut runs = store.list_runs("wf-1").await.unwrap();
        runs.sort();
        assert_eq!(runs, vec!["run-a".to_string(), "run-b".to_string()]);

        let workflows = store.list_workflows().await.unwrap();
        assert_eq!(workflows, vec!["wf-1".to_string(), "wf-2".to_string()]);
    }
}
