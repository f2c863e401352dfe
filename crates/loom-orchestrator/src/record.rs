//! Per-node execution records.

use std::collections::BTreeSet;

use loom_config::Mapping;
use loom_store::{NodeReport, NodeStatus};
use serde::{Deserialize, Serialize};

/// Mutable state of one node within one run.
///
/// Exactly one executor task owns a record while the node runs; the scheduler
/// gets it back when the task finishes. Status only moves forward:
/// `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExecution {
  pub node_id: String,
  pub status: NodeStatus,
  /// The node's envelope once it completed.
  pub result: Option<serde_json::Value>,
  pub error: Option<String>,
  /// Attempts consumed minus one.
  pub retries: u32,
  pub predecessors: BTreeSet<String>,
}

impl NodeExecution {
  pub fn new(node_id: impl Into<String>, predecessors: BTreeSet<String>) -> Self {
    Self {
      node_id: node_id.into(),
      status: NodeStatus::Pending,
      result: None,
      error: None,
      retries: 0,
      predecessors,
    }
  }

  pub fn start(&mut self) {
    debug_assert_eq!(self.status, NodeStatus::Pending);
    self.status = NodeStatus::Running;
  }

  pub fn complete(&mut self, envelope: &NodeEnvelope) {
    debug_assert!(!self.status.is_finished());
    self.status = NodeStatus::Completed;
    self.result = serde_json::to_value(envelope).ok();
    self.error = None;
  }

  pub fn fail(&mut self, error: impl Into<String>) {
    debug_assert!(!self.status.is_finished());
    self.status = NodeStatus::Failed;
    self.error = Some(error.into());
  }

  /// The polled view of this record.
  pub fn report(&self) -> NodeReport {
    NodeReport {
      status: self.status,
      result: self.result.clone(),
      error: self.error.clone(),
      retries: self.retries,
    }
  }
}

/// What a completed node hands to its successors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEnvelope {
  /// The agent's output mapping.
  pub result: Mapping,
  pub node_id: String,
  pub agent_type: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_record_lifecycle() {
    let mut record = NodeExecution::new("b", BTreeSet::from(["a".to_string()]));
    assert_eq!(record.report(), NodeReport::default());

    record.start();
    assert_eq!(record.status, NodeStatus::Running);

    let mut result = Mapping::new();
    result.insert("result".to_string(), json!(30));
    record.complete(&NodeEnvelope {
      result,
      node_id: "b".to_string(),
      agent_type: "multiply".to_string(),
    });

    let report = record.report();
    assert_eq!(report.status, NodeStatus::Completed);
    assert_eq!(
      report.result,
      Some(json!({"result": {"result": 30}, "node_id": "b", "agent_type": "multiply"}))
    );
    assert_eq!(report.error, None);
  }

  #[test]
  fn test_failed_record_keeps_error() {
    let mut record = NodeExecution::new("a", BTreeSet::new());
    record.start();
    record.retries = 2;
    record.fail("boom");

    let report = record.report();
    assert_eq!(report.status, NodeStatus::Failed);
    assert_eq!(report.error.as_deref(), Some("boom"));
    assert_eq!(report.retries, 2);
    assert!(report.result.is_none());
  }
}
