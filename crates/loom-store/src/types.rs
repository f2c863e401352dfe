use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use loom_config::WorkflowDef;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl RunStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
    )
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      RunStatus::Pending => "pending",
      RunStatus::Running => "running",
      RunStatus::Completed => "completed",
      RunStatus::Failed => "failed",
      RunStatus::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}

/// Status of a single node within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  #[default]
  Pending,
  Running,
  Completed,
  Failed,
}

impl NodeStatus {
  pub fn is_finished(self) -> bool {
    matches!(self, NodeStatus::Completed | NodeStatus::Failed)
  }
}

impl fmt::Display for NodeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeStatus::Pending => "pending",
      NodeStatus::Running => "running",
      NodeStatus::Completed => "completed",
      NodeStatus::Failed => "failed",
    };
    f.write_str(s)
  }
}

/// The polled view of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
  pub status: NodeStatus,
  pub result: Option<serde_json::Value>,
  pub error: Option<String>,
  pub retries: u32,
}

/// A run as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
  pub run_id: String,
  pub spec: WorkflowDef,
  pub status: RunStatus,
  pub error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub nodes: BTreeMap<String, NodeReport>,
  #[serde(skip)]
  pub artifacts: BTreeMap<String, Bytes>,
}

impl Run {
  pub fn new(run_id: impl Into<String>, spec: WorkflowDef) -> Self {
    let now = Utc::now();
    Self {
      run_id: run_id.into(),
      spec,
      status: RunStatus::Pending,
      error: None,
      created_at: now,
      updated_at: now,
      nodes: BTreeMap::new(),
      artifacts: BTreeMap::new(),
    }
  }

  pub fn summary(&self) -> RunSummary {
    RunSummary {
      run_id: self.run_id.clone(),
      name: self.spec.name.clone(),
      status: self.status,
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }

  pub(crate) fn touch(&mut self) {
    self.updated_at = Utc::now();
  }
}

/// Listing entry for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
  pub run_id: String,
  pub name: Option<String>,
  pub status: RunStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_statuses() {
    assert!(!RunStatus::Pending.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
    assert!(RunStatus::Cancelled.is_terminal());
  }

  #[test]
  fn test_node_report_serializes_nulls() {
    let report = NodeReport::default();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(
      value,
      serde_json::json!({"status": "pending", "result": null, "error": null, "retries": 0})
    );
  }
}
