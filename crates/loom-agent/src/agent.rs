use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Mapping;

/// Implementation-defined agent error.
pub type AgentFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The capability every unit of work must provide.
///
/// The engine imposes timeouts from the outside; implementations do not need
/// to limit their own runtime, but must tolerate being dropped mid-call.
#[async_trait]
pub trait Agent: Send + Sync {
  async fn run(&self, inputs: Mapping, ctx: &AgentContext) -> Result<Mapping, AgentFailure>;
}

/// Destination for binary artifacts produced by agents.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
  async fn put(&self, name: &str, data: Bytes) -> Result<(), AgentFailure>;
}

/// Sink that drops every artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardArtifacts;

#[async_trait]
impl ArtifactSink for DiscardArtifacts {
  async fn put(&self, _name: &str, _data: Bytes) -> Result<(), AgentFailure> {
    Ok(())
  }
}

/// Per-call context handed to an agent alongside its inputs.
#[derive(Clone)]
pub struct AgentContext {
  pub run_id: String,
  pub node_id: String,
  /// Zero-based attempt number for this node.
  pub attempt: u32,
  artifacts: Arc<dyn ArtifactSink>,
}

impl AgentContext {
  pub fn new(
    run_id: impl Into<String>,
    node_id: impl Into<String>,
    artifacts: Arc<dyn ArtifactSink>,
  ) -> Self {
    Self {
      run_id: run_id.into(),
      node_id: node_id.into(),
      attempt: 0,
      artifacts,
    }
  }

  /// A context outside of any run. Artifacts are discarded.
  pub fn detached(node_id: impl Into<String>) -> Self {
    Self::new(String::new(), node_id, Arc::new(DiscardArtifacts))
  }

  pub fn with_attempt(mut self, attempt: u32) -> Self {
    self.attempt = attempt;
    self
  }

  /// Store a binary artifact for the current run.
  pub async fn put_artifact(
    &self,
    name: &str,
    data: impl Into<Bytes>,
  ) -> Result<(), AgentFailure> {
    self.artifacts.put(name, data.into()).await
  }
}

impl fmt::Debug for AgentContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AgentContext")
      .field("run_id", &self.run_id)
      .field("node_id", &self.node_id)
      .field("attempt", &self.attempt)
      .finish_non_exhaustive()
  }
}
