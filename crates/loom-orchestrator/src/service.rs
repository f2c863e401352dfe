//! Run lifecycle: submission, polling, and cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loom_agent::AgentRegistry;
use loom_config::{RunConfig, WorkflowDef};
use loom_store::{InMemoryRunStore, Run, RunStatus, RunStore, RunSummary};
use loom_workflow::Workflow;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::scheduler::{RunOutcome, Scheduler};

/// Front door of the engine.
///
/// Validates submissions, assigns run ids, drives runs through the
/// [`Scheduler`], and keeps the run's lifecycle status in the store current.
/// Cheap to clone; clones share the same store and active-run table.
#[derive(Clone)]
pub struct Orchestrator {
  scheduler: Scheduler,
  store: Arc<dyn RunStore>,
  defaults: RunConfig,
  active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Orchestrator {
  pub fn new(registry: AgentRegistry, store: Arc<dyn RunStore>) -> Self {
    Self::with_notifier(registry, store, Arc::new(NoopNotifier))
  }

  /// An orchestrator backed by a fresh [`InMemoryRunStore`].
  pub fn in_memory(registry: AgentRegistry) -> Self {
    Self::new(registry, Arc::new(InMemoryRunStore::new()))
  }

  pub fn with_notifier(
    registry: AgentRegistry,
    store: Arc<dyn RunStore>,
    notifier: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    Self {
      scheduler: Scheduler::new(Arc::new(registry), store.clone(), notifier),
      store,
      defaults: RunConfig::default(),
      active: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Configuration for runs whose definition carries none.
  pub fn with_defaults(mut self, config: RunConfig) -> Self {
    self.defaults = config;
    self
  }

  pub fn registry(&self) -> &AgentRegistry {
    self.scheduler.registry()
  }

  pub fn store(&self) -> &Arc<dyn RunStore> {
    &self.store
  }

  /// Validate and enqueue a run. Returns its id immediately; the run executes
  /// in the background.
  pub async fn submit(&self, def: WorkflowDef) -> Result<String, OrchestratorError> {
    let cancel = CancellationToken::new();
    let (run_id, workflow, config) = self.start(def, &cancel).await?;

    let this = self.clone();
    let id = run_id.clone();
    tokio::spawn(async move {
      // Outcome is recorded in the store.
      let _ = this.drive(&id, workflow, config, cancel).await;
    });

    Ok(run_id)
  }

  /// Validate a run and execute it to completion.
  ///
  /// Node failures are reported in the outcome. Runs that abort (deadlock,
  /// cancellation, internal errors) return `Err` and the store carries the
  /// run-level error.
  pub async fn execute(&self, def: WorkflowDef) -> Result<RunOutcome, OrchestratorError> {
    self.execute_with_cancel(def, CancellationToken::new()).await
  }

  /// Like [`Orchestrator::execute`], stopping early once `cancel` fires.
  pub async fn execute_with_cancel(
    &self,
    def: WorkflowDef,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, OrchestratorError> {
    let (run_id, workflow, config) = self.start(def, &cancel).await?;
    self.drive(&run_id, workflow, config, cancel).await
  }

  pub async fn get_run(&self, run_id: &str) -> Result<Run, OrchestratorError> {
    Ok(self.store.get_run(run_id).await?)
  }

  pub async fn list_runs(&self) -> Result<Vec<RunSummary>, OrchestratorError> {
    Ok(self.store.list_runs().await?)
  }

  /// Request cancellation of a run.
  ///
  /// Returns `false` if the run had already reached a terminal status.
  pub async fn cancel(&self, run_id: &str) -> Result<bool, OrchestratorError> {
    let token = self.active().get(run_id).cloned();
    // The store transition decides the outcome. Once it lands, the driver's
    // later status writes are ignored.
    let cancelled = self.store.cancel_run(run_id).await?;
    if let Some(token) = token {
      token.cancel();
    }
    if cancelled {
      info!(run_id = %run_id, "run cancellation requested");
    }
    Ok(cancelled)
  }

  /// Number of runs currently executing.
  pub fn active_runs(&self) -> usize {
    self.active().len()
  }

  async fn start(
    &self,
    def: WorkflowDef,
    cancel: &CancellationToken,
  ) -> Result<(String, Workflow, RunConfig), OrchestratorError> {
    let workflow = Workflow::new(def.clone())?;
    let config = workflow
      .config
      .clone()
      .unwrap_or_else(|| self.defaults.clone());
    config.validate()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    self.store.create_run(&run_id, &def).await?;

    self.active().insert(run_id.clone(), cancel.clone());

    info!(
      run_id = %run_id,
      workflow = workflow.name.as_deref().unwrap_or(""),
      nodes = workflow.nodes.len(),
      "run submitted"
    );
    Ok((run_id, workflow, config))
  }

  async fn drive(
    &self,
    run_id: &str,
    workflow: Workflow,
    config: RunConfig,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, OrchestratorError> {
    self.set_status(run_id, RunStatus::Running).await;

    let result = self
      .scheduler
      .execute(run_id, &workflow, &config, cancel.clone())
      .await;

    match &result {
      // A cancel that lands after the last wave keeps the run cancelled.
      Ok(_) if cancel.is_cancelled() => self.set_status(run_id, RunStatus::Cancelled).await,
      Ok(outcome) => self.set_status(run_id, outcome.status).await,
      Err(OrchestratorError::Cancelled) => self.set_status(run_id, RunStatus::Cancelled).await,
      Err(e) => {
        if let Err(store_err) = self.store.set_error(run_id, &e.to_string()).await {
          warn!(run_id = %run_id, error = %store_err, "failed to record run error");
        }
        self.set_status(run_id, RunStatus::Failed).await;
      }
    }

    self.active().remove(run_id);
    result
  }

  async fn set_status(&self, run_id: &str, status: RunStatus) {
    if let Err(e) = self.store.set_status(run_id, status).await {
      warn!(run_id = %run_id, status = %status, error = %e, "failed to record run status");
    }
  }

  fn active(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    self.active.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
