//! Orchestrator errors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use loom_agent::AgentError;
use loom_config::ConfigError;
use loom_store::StoreError;
use loom_workflow::WorkflowError;

/// Why a single node ended in the `Failed` state.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
  /// The node has no agent type. Not retried.
  #[error("node '{node_id}' is missing an agent type")]
  MissingAgentType { node_id: String },

  /// No agent is registered under the node's agent type. Not retried.
  #[error("agent type '{agent_type}' not found in registered agents (available: {available})")]
  UnknownAgentType {
    node_id: String,
    agent_type: String,
    available: String,
  },

  /// Every attempt failed or timed out.
  #[error("node '{node_id}' failed after {retries} retries: {source}")]
  Exhausted {
    node_id: String,
    retries: u32,
    #[source]
    source: AgentError,
  },

  /// A predecessor failed and the run cascades failures.
  #[error("upstream node '{upstream}' failed")]
  UpstreamFailed { node_id: String, upstream: String },

  /// The run was cancelled while this node was running.
  #[error("node execution was cancelled")]
  Cancelled { node_id: String },
}

impl NodeError {
  pub fn node_id(&self) -> &str {
    match self {
      NodeError::MissingAgentType { node_id }
      | NodeError::UnknownAgentType { node_id, .. }
      | NodeError::Exhausted { node_id, .. }
      | NodeError::UpstreamFailed { node_id, .. }
      | NodeError::Cancelled { node_id } => node_id,
    }
  }

  /// Configuration problems are reported without any agent call.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      NodeError::MissingAgentType { .. } | NodeError::UnknownAgentType { .. }
    )
  }
}

/// Nodes that can never become runnable, with the predecessors they are
/// still waiting for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedNodes(pub BTreeMap<String, BTreeSet<String>>);

impl BlockedNodes {
  pub fn node_ids(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn missing(&self, node_id: &str) -> Option<&BTreeSet<String>> {
    self.0.get(node_id)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for BlockedNodes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (node_id, missing) in &self.0 {
      if !first {
        f.write_str("; ")?;
      }
      first = false;
      let missing: Vec<&str> = missing.iter().map(String::as_str).collect();
      write!(f, "{} waiting for [{}]", node_id, missing.join(", "))?;
    }
    Ok(())
  }
}

/// Run-level errors.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
  /// The workflow definition is invalid.
  #[error("invalid workflow: {0}")]
  InvalidWorkflow(#[from] WorkflowError),

  /// The run configuration is invalid.
  #[error("invalid run configuration: {0}")]
  InvalidConfig(#[from] ConfigError),

  /// Work remains pending but nothing can become runnable.
  #[error("deadlock in dependency graph; blocked nodes: {0}")]
  Deadlock(BlockedNodes),

  /// The run was cancelled.
  #[error("run cancelled")]
  Cancelled,

  /// Storage collaborator error.
  #[error("store error: {0}")]
  Store(#[from] StoreError),

  /// Unexpected failure inside the engine.
  #[error("internal error: {message}")]
  Internal { message: String },
}
