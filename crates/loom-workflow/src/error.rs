use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("node at position {index} has an empty id")]
  EmptyNodeId { index: usize },

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("node '{0}' has a zero timeout")]
  ZeroNodeTimeout(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },
}
