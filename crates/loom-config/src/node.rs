use serde::{Deserialize, Serialize};

use crate::Mapping;

/// A single workflow step as submitted.
///
/// `agent_type` is optional at the serialization layer so that a node missing
/// it can still be loaded; the executor reports it as a configuration error
/// for that node rather than rejecting the whole workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub id: String,
  #[serde(
    default,
    alias = "agent",
    alias = "agentType",
    skip_serializing_if = "Option::is_none"
  )]
  pub agent_type: Option<String>,
  #[serde(default)]
  pub params: Mapping,
  /// Per-call timeout override for this node.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Retry limit override for this node.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_retries: Option<u32>,
}

impl NodeDef {
  pub fn new(id: impl Into<String>, agent_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      agent_type: Some(agent_type.into()),
      params: Mapping::new(),
      timeout_ms: None,
      max_retries: None,
    }
  }

  /// Set a static parameter.
  pub fn param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.params.insert(key.into(), value);
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }

  pub fn with_max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = Some(max_retries);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_accepts_agent_aliases() {
    let a: NodeDef = serde_json::from_value(json!({"id": "a", "agent": "add"})).unwrap();
    let b: NodeDef = serde_json::from_value(json!({"id": "b", "agentType": "add"})).unwrap();
    let c: NodeDef = serde_json::from_value(json!({"id": "c", "agent_type": "add"})).unwrap();

    for node in [a, b, c] {
      assert_eq!(node.agent_type.as_deref(), Some("add"));
      assert!(node.params.is_empty());
    }
  }

  #[test]
  fn test_missing_agent_type_still_parses() {
    let node: NodeDef = serde_json::from_value(json!({"id": "orphan"})).unwrap();
    assert_eq!(node.agent_type, None);
  }
}
