//! Loom Store
//!
//! This crate provides the storage trait for workflow runs and an in-memory
//! implementation. The engine writes to the store incrementally, one node at a
//! time, so that pollers observe partial progress of a long run.
//!
//! The [`RunStore`] trait defines operations for:
//! - Creating runs and updating their lifecycle status
//! - Recording per-node reports as nodes start and finish
//! - Storing binary artifacts produced by agents
//! - Querying runs by id and listing all runs

mod memory;
mod types;

pub use memory::InMemoryRunStore;
pub use types::{NodeReport, NodeStatus, Run, RunStatus, RunSummary};

use async_trait::async_trait;
use bytes::Bytes;
use loom_config::WorkflowDef;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  /// The requested run was not found.
  #[error("run not found: {0}")]
  NotFound(String),

  /// A run with this id already exists.
  #[error("run already exists: {0}")]
  AlreadyExists(String),
}

/// Storage trait for workflow runs.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Create a new run in the `Pending` state.
  async fn create_run(&self, run_id: &str, spec: &WorkflowDef) -> Result<(), StoreError>;

  /// Record the latest report for one node of a run.
  async fn set_node_result(
    &self,
    run_id: &str,
    node_id: &str,
    report: NodeReport,
  ) -> Result<(), StoreError>;

  /// Update the lifecycle status of a run.
  ///
  /// A run that reached a terminal status keeps it; later writes are ignored.
  async fn set_status(&self, run_id: &str, status: RunStatus) -> Result<(), StoreError>;

  /// Attach a run-level error message.
  async fn set_error(&self, run_id: &str, message: &str) -> Result<(), StoreError>;

  /// Store a binary artifact under `name`, replacing any previous one.
  async fn add_artifact(&self, run_id: &str, name: &str, data: Bytes) -> Result<(), StoreError>;

  /// Get a snapshot of a run.
  async fn get_run(&self, run_id: &str) -> Result<Run, StoreError>;

  /// List all runs, oldest first.
  async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError>;

  /// Mark a run cancelled unless it already reached a terminal status.
  ///
  /// Returns `false` if the run was already terminal.
  async fn cancel_run(&self, run_id: &str) -> Result<bool, StoreError>;
}
