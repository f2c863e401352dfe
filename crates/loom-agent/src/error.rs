//! Agent error types.

use std::time::Duration;

use crate::agent::AgentFailure;

/// Errors produced by a single agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
  /// The agent returned an error.
  #[error("agent '{agent}' failed: {source}")]
  Failed {
    agent: String,
    #[source]
    source: AgentFailure,
  },

  /// The agent did not finish within the allotted time.
  #[error("agent '{agent}' timed out after {timeout:?}")]
  Timeout { agent: String, timeout: Duration },
}

impl AgentError {
  pub fn agent(&self) -> &str {
    match self {
      AgentError::Failed { agent, .. } | AgentError::Timeout { agent, .. } => agent,
    }
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, AgentError::Timeout { .. })
  }
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
  #[error("agent '{0}' is already registered")]
  AlreadyRegistered(String),
}
