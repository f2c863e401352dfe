use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use loom_agent::{AgentFailure, ArtifactSink};
use loom_store::RunStore;

/// Writes agent artifacts into the run's store entry.
pub(crate) struct StoreArtifacts {
  store: Arc<dyn RunStore>,
  run_id: String,
}

impl StoreArtifacts {
  pub(crate) fn new(store: Arc<dyn RunStore>, run_id: impl Into<String>) -> Self {
    Self {
      store,
      run_id: run_id.into(),
    }
  }
}

#[async_trait]
impl ArtifactSink for StoreArtifacts {
  async fn put(&self, name: &str, data: Bytes) -> Result<(), AgentFailure> {
    self
      .store
      .add_artifact(&self.run_id, name, data)
      .await
      .map_err(|e| Box::new(e) as AgentFailure)
  }
}
