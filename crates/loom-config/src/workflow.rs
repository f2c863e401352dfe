use serde::{Deserialize, Serialize};

use crate::Mapping;
use crate::edge::EdgeDef;
use crate::node::NodeDef;
use crate::run_config::RunConfig;

/// A workflow as submitted: a flat node list, a flat edge list, and the
/// inputs every node starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
  #[serde(default, alias = "initialInputs")]
  pub initial_inputs: Mapping,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub config: Option<RunConfig>,
}

impl WorkflowDef {
  pub fn new(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> Self {
    Self {
      nodes,
      edges,
      ..Self::default()
    }
  }

  pub fn with_initial_inputs(mut self, inputs: Mapping) -> Self {
    self.initial_inputs = inputs;
    self
  }

  pub fn with_config(mut self, config: RunConfig) -> Self {
    self.config = Some(config);
    self
  }
}
