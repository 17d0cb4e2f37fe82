//! The append-only, step-indexed execution history for one `(workflow_id, run_id)`.
//!
//! A plain vector indexed by `step`. Forking is copy-prefix, truncation is
//! drop-suffix; there is no CRDT or merge logic here.

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};
use crate::snapshot::{ForkPoint, StepSnapshot};

/// The full persisted record for one run: identity, lineage, and the ordered snapshot
/// sequence. This is the value `StateStore::save_state`/`load_state` round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingData {
    /// Identifier of the workflow definition this run executes.
    pub workflow_id: String,
    /// Identifier of this particular run.
    pub run_id: String,
    /// Present when this run was created by [`Journal::fork`].
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub forked_from: Option<ForkPoint>,
    /// Snapshots in step order; `steps[k].step == k` is an invariant maintained by
    /// [`Journal::append`].
    pub steps: Vec<StepSnapshot>,
}

impl TrackingData {
    /// An empty tracking record for a brand-new run.
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            forked_from: None,
            steps: Vec::new(),
        }
    }
}

/// The live view of a run's journal.
///
/// `Journal` owns the snapshot sequence exclusively; the engine never mutates `steps`
/// directly, only through `append`/`truncate`/`fork`.
#[derive(Debug, Clone)]
pub struct Journal {
    data: TrackingData,
}

impl Journal {
    /// Wraps an existing tracking record (e.g. one just loaded from a store).
    pub fn from_tracking_data(data: TrackingData) -> Self {
        Self { data }
    }

    /// Starts a fresh, empty journal for a brand-new run.
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::from_tracking_data(TrackingData::new(workflow_id, run_id))
    }

    /// Read-only access to the underlying tracking record.
    pub fn tracking_data(&self) -> &TrackingData {
        &self.data
    }

    /// Consumes the journal, returning its tracking record (e.g. to persist it).
    pub fn into_tracking_data(self) -> TrackingData {
        self.data
    }

    /// All snapshots in step order.
    pub fn read_all(&self) -> &[StepSnapshot] {
        &self.data.steps
    }

    /// The snapshot at a given step, if present.
    pub fn read(&self, step: u64) -> Result<&StepSnapshot> {
        self.data
            .steps
            .get(step as usize)
            .ok_or(JournalError::UnknownStep(step))
    }

    /// The most recently appended snapshot, if any have been appended yet.
    pub fn latest(&self) -> Option<&StepSnapshot> {
        self.data.steps.last()
    }

    /// The next step index this journal expects from `append`.
    pub fn next_step(&self) -> u64 {
        self.data.steps.len() as u64
    }

    /// Appends `snapshot` to the journal.
    ///
    /// `snapshot.step` MUST equal `len(steps)` at call time; this is the only ordering
    /// the journal itself enforces, and it is checked unconditionally because the
    /// engine relies on it to guarantee gapless history.
    pub fn append(&mut self, snapshot: StepSnapshot) -> Result<()> {
        let expected = self.next_step();
        if snapshot.step != expected {
            return Err(JournalError::AppendOutOfOrder {
                expected,
                actual: snapshot.step,
            });
        }
        tracing::debug!(
            workflow_id = %self.data.workflow_id,
            run_id = %self.data.run_id,
            step = snapshot.step,
            "journal: appended snapshot"
        );
        self.data.steps.push(snapshot);
        Ok(())
    }

    /// Discards every snapshot at an index greater than `to_step`.
    ///
    /// Used when resuming from a historical step before running further, and as the
    /// first half of [`Journal::fork`].
    pub fn truncate(&mut self, to_step: u64) {
        let keep = (to_step as usize).saturating_add(1);
        if keep < self.data.steps.len() {
            tracing::debug!(
                run_id = %self.data.run_id,
                to_step,
                dropped = self.data.steps.len() - keep,
                "journal: truncated"
            );
        }
        self.data.steps.truncate(keep);
    }

    /// Rebuilds the live state implied by a historical step: the shared-state value and
    /// the node id that should run next.
    ///
    /// This is exactly `(steps[step].shared, steps[step].next_node_id)`.
    pub fn resume_from(&self, step: u64) -> Result<(serde_json::Value, Option<String>)> {
        let snap = self.read(step)?;
        Ok((snap.shared.clone(), snap.next_node_id.clone()))
    }

    /// Creates a sibling journal seeded with a copy of `steps[0..=up_to_step]`, tagged
    /// with a [`ForkPoint`] back to this run.
    ///
    /// The new journal's prefix is byte-identical to the parent's except for
    /// `metadata.forked_from` on step 0.
    pub fn fork(&self, new_run_id: impl Into<String>, up_to_step: u64) -> Result<Journal> {
        let new_run_id = new_run_id.into();
        if up_to_step as usize >= self.data.steps.len() {
            return Err(JournalError::UnknownStep(up_to_step));
        }
        let mut steps: Vec<StepSnapshot> = self.data.steps[..=(up_to_step as usize)].to_vec();
        let fork_point = ForkPoint {
            parent_run_id: self.data.run_id.clone(),
            step: up_to_step,
        };
        if let Some(first) = steps.first_mut() {
            first.metadata.forked_from = Some(fork_point.clone());
        }
        let forked = TrackingData {
            workflow_id: self.data.workflow_id.clone(),
            run_id: new_run_id,
            forked_from: Some(fork_point),
            steps,
        };
        Ok(Journal::from_tracking_data(forked))
    }

    /// Workflow id this journal belongs to.
    pub fn workflow_id(&self) -> &str {
        &self.data.workflow_id
    }

    /// Run id this journal belongs to.
    pub fn run_id(&self) -> &str {
        &self.data.run_id
    }
}
