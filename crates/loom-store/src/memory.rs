use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use loom_config::WorkflowDef;
use tokio::sync::{Mutex, RwLock};

use crate::types::{NodeReport, Run, RunStatus, RunSummary};
use crate::{RunStore, StoreError};

/// Process-local run store.
///
/// The outer lock only guards the run table; each run has its own mutex so
/// updates to different runs never contend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRunStore {
  runs: Arc<RwLock<HashMap<String, Arc<Mutex<Run>>>>>,
}

impl InMemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }

  async fn run(&self, run_id: &str) -> Result<Arc<Mutex<Run>>, StoreError> {
    self
      .runs
      .read()
      .await
      .get(run_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
  }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
  async fn create_run(&self, run_id: &str, spec: &WorkflowDef) -> Result<(), StoreError> {
    let mut runs = self.runs.write().await;
    if runs.contains_key(run_id) {
      return Err(StoreError::AlreadyExists(run_id.to_string()));
    }
    runs.insert(
      run_id.to_string(),
      Arc::new(Mutex::new(Run::new(run_id, spec.clone()))),
    );
    Ok(())
  }

  async fn set_node_result(
    &self,
    run_id: &str,
    node_id: &str,
    report: NodeReport,
  ) -> Result<(), StoreError> {
    let run = self.run(run_id).await?;
    let mut run = run.lock().await;
    run.nodes.insert(node_id.to_string(), report);
    run.touch();
    Ok(())
  }

  async fn set_status(&self, run_id: &str, status: RunStatus) -> Result<(), StoreError> {
    let run = self.run(run_id).await?;
    let mut run = run.lock().await;
    if run.status.is_terminal() {
      return Ok(());
    }
    run.status = status;
    run.touch();
    Ok(())
  }

  async fn set_error(&self, run_id: &str, message: &str) -> Result<(), StoreError> {
    let run = self.run(run_id).await?;
    let mut run = run.lock().await;
    run.error = Some(message.to_string());
    run.touch();
    Ok(())
  }

  async fn add_artifact(&self, run_id: &str, name: &str, data: Bytes) -> Result<(), StoreError> {
    let run = self.run(run_id).await?;
    let mut run = run.lock().await;
    run.artifacts.insert(name.to_string(), data);
    run.touch();
    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
    let run = self.run(run_id).await?;
    let run = run.lock().await;
    Ok(run.clone())
  }

  async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError> {
    let handles: Vec<Arc<Mutex<Run>>> = self.runs.read().await.values().cloned().collect();

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
      summaries.push(handle.lock().await.summary());
    }
    summaries.sort_by(|a, b| {
      a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.run_id.cmp(&b.run_id))
    });
    Ok(summaries)
  }

  async fn cancel_run(&self, run_id: &str) -> Result<bool, StoreError> {
    let run = self.run(run_id).await?;
    let mut run = run.lock().await;
    if run.status.is_terminal() {
      return Ok(false);
    }
    run.status = RunStatus::Cancelled;
    run.touch();
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::NodeStatus;
  use std::time::Duration;

  fn spec() -> WorkflowDef {
    WorkflowDef {
      name: Some("test".to_string()),
      ..WorkflowDef::default()
    }
  }

  #[tokio::test]
  async fn test_create_and_get_run() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();

    let run = store.get_run("r1").await.unwrap();
    assert_eq!(run.run_id, "r1");
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.nodes.is_empty());
    assert_eq!(run.created_at, run.updated_at);
  }

  #[tokio::test]
  async fn test_duplicate_run_rejected() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();

    let err = store.create_run("r1", &spec()).await.unwrap_err();
    assert_eq!(err, StoreError::AlreadyExists("r1".to_string()));
  }

  #[tokio::test]
  async fn test_unknown_run_is_not_found() {
    let store = InMemoryRunStore::new();

    assert_eq!(
      store.get_run("nope").await.unwrap_err(),
      StoreError::NotFound("nope".to_string())
    );
    assert!(
      store
        .set_status("nope", RunStatus::Running)
        .await
        .is_err()
    );
  }

  #[tokio::test]
  async fn test_updates_bump_timestamp() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();
    let created = store.get_run("r1").await.unwrap().updated_at;

    tokio::time::sleep(Duration::from_millis(5)).await;
    store
      .set_node_result(
        "r1",
        "a",
        NodeReport {
          status: NodeStatus::Completed,
          result: Some(serde_json::json!({"result": 10})),
          error: None,
          retries: 0,
        },
      )
      .await
      .unwrap();

    let run = store.get_run("r1").await.unwrap();
    assert!(run.updated_at > created);
    assert_eq!(run.nodes["a"].status, NodeStatus::Completed);
  }

  #[tokio::test]
  async fn test_artifacts_and_error() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();

    store
      .add_artifact("r1", "chart.svg", Bytes::from_static(b"<svg/>"))
      .await
      .unwrap();
    store.set_error("r1", "deadlock").await.unwrap();

    let run = store.get_run("r1").await.unwrap();
    assert_eq!(run.artifacts["chart.svg"], Bytes::from_static(b"<svg/>"));
    assert_eq!(run.error.as_deref(), Some("deadlock"));
  }

  #[tokio::test]
  async fn test_cancel_only_non_terminal_runs() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();
    store.create_run("r2", &spec()).await.unwrap();
    store.set_status("r2", RunStatus::Completed).await.unwrap();

    assert!(store.cancel_run("r1").await.unwrap());
    assert!(!store.cancel_run("r2").await.unwrap());
    assert_eq!(
      store.get_run("r1").await.unwrap().status,
      RunStatus::Cancelled
    );
    assert_eq!(
      store.get_run("r2").await.unwrap().status,
      RunStatus::Completed
    );
  }

  #[tokio::test]
  async fn test_terminal_status_is_final() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();
    store.create_run("r2", &spec()).await.unwrap();

    assert!(store.cancel_run("r1").await.unwrap());
    store.set_status("r1", RunStatus::Running).await.unwrap();
    store.set_status("r1", RunStatus::Completed).await.unwrap();
    assert_eq!(
      store.get_run("r1").await.unwrap().status,
      RunStatus::Cancelled
    );

    store.set_status("r2", RunStatus::Running).await.unwrap();
    store.set_status("r2", RunStatus::Failed).await.unwrap();
    store.set_status("r2", RunStatus::Running).await.unwrap();
    assert_eq!(store.get_run("r2").await.unwrap().status, RunStatus::Failed);
  }

  #[tokio::test]
  async fn test_list_runs() {
    let store = InMemoryRunStore::new();
    store.create_run("r1", &spec()).await.unwrap();
    store.create_run("r2", &spec()).await.unwrap();

    let runs = store.list_runs().await.unwrap();
    let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(runs.len(), 2);
    assert!(ids.contains(&"r1") && ids.contains(&"r2"));
    assert_eq!(runs[0].name.as_deref(), Some("test"));
  }
}
