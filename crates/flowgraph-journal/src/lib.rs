//! # flowgraph-journal — step-indexed history and the state-store port
//!
//! This crate holds everything the execution engine in `flowgraph-core` needs to
//! persist and resume a run, without depending on the engine itself:
//!
//! - [`snapshot`] — the immutable [`StepSnapshot`] record and everything it is made of
//!   (`NodeStatus`, `InputRequest`, `WorkflowStatus`).
//! - [`journal`] — [`Journal`], the append-only, step-indexed history for one run, plus
//!   [`TrackingData`], the value a [`StateStore`] persists.
//! - [`store`] — the abstract [`StateStore`] port that concrete backends implement.
//! - [`memory`] — [`InMemoryStateStore`], a reference backend for tests and development.
//!
//! Splitting this out of the core crate mirrors how this corpus separates graph
//! execution from checkpoint persistence: alternative store backends (filesystem, SQL)
//! can depend on just this crate instead of the whole engine.

pub mod error;
pub mod journal;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use error::{JournalError, Result, StoreError};
pub use journal::{Journal, TrackingData};
pub use memory::InMemoryStateStore;
pub use snapshot::{ForkPoint, InputRequest, NodeStatus, StepMetadata, StepSnapshot, WorkflowStatus};
pub use store::StateStore;
