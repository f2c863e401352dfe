//! Wave-by-wave DAG scheduling.
//!
//! A run moves through a small state machine:
//!
//! ```text
//! Initializing -> Dispatching <-> Draining
//!                      |
//!                      +-> Done | Deadlocked
//! ```
//!
//! `Dispatching` collects every pending node whose predecessors have all
//! finished and spawns them as one wave. `Draining` waits for the whole wave
//! before anything else is dispatched, so a node in wave `k + 1` never starts
//! before every node of wave `k` has finished.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use loom_agent::AgentRegistry;
use loom_config::{FailurePolicy, RunConfig};
use loom_store::{NodeReport, RunStatus, RunStore};
use loom_workflow::Workflow;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{BlockedNodes, NodeError, OrchestratorError};
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::executor::{ExecutorOutput, NodeExecutor, RunContext};
use crate::record::{NodeEnvelope, NodeExecution};

/// Final state of a run that did not abort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
  pub run_id: String,
  /// `Completed` only if every node completed.
  pub status: RunStatus,
  pub nodes: BTreeMap<String, NodeReport>,
  /// Number of waves dispatched.
  pub waves: usize,
}

impl RunOutcome {
  pub fn node(&self, node_id: &str) -> Option<&NodeReport> {
    self.nodes.get(node_id)
  }

  /// The agent output of a completed node.
  pub fn output(&self, node_id: &str) -> Option<&serde_json::Value> {
    self.node(node_id)?.result.as_ref()?.get("result")
  }
}

enum Phase {
  Initializing,
  Dispatching,
  Draining(Vec<JoinHandle<ExecutorOutput>>),
  Done,
  Deadlocked(BlockedNodes),
}

#[derive(Default)]
struct WaveState {
  /// Records not currently owned by an executor task.
  records: BTreeMap<String, NodeExecution>,
  pending: BTreeSet<String>,
  finished: BTreeSet<String>,
  failed: BTreeSet<String>,
  results: HashMap<String, Arc<NodeEnvelope>>,
  wave: usize,
}

impl WaveState {
  fn finish(&mut self, record: NodeExecution, outcome: Result<NodeEnvelope, NodeError>) {
    let node_id = record.node_id.clone();
    match outcome {
      Ok(envelope) => {
        self.results.insert(node_id.clone(), Arc::new(envelope));
      }
      Err(_) => {
        self.failed.insert(node_id.clone());
      }
    }
    self.finished.insert(node_id.clone());
    self.records.insert(node_id, record);
  }

  fn blocked(&self, workflow: &Workflow) -> BlockedNodes {
    let graph = workflow.graph();
    BlockedNodes(
      self
        .pending
        .iter()
        .map(|id| {
          let missing = graph
            .predecessors(id)
            .iter()
            .filter(|p| !self.finished.contains(*p))
            .cloned()
            .collect();
          (id.clone(), missing)
        })
        .collect(),
    )
  }
}

/// Executes validated workflows against a registry and a store.
///
/// The scheduler itself is stateless between runs; each call to
/// [`Scheduler::execute`] owns its own wave state.
#[derive(Clone)]
pub struct Scheduler {
  registry: Arc<AgentRegistry>,
  store: Arc<dyn RunStore>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Scheduler {
  pub fn new(
    registry: Arc<AgentRegistry>,
    store: Arc<dyn RunStore>,
    notifier: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    Self {
      registry,
      store,
      notifier,
    }
  }

  pub fn registry(&self) -> &AgentRegistry {
    &self.registry
  }

  /// Run every node of `workflow` under `run_id`.
  ///
  /// The run must already exist in the store. Node reports are written to the
  /// store as they change; the run's own status is left to the caller.
  #[instrument(
    name = "run_execute",
    skip_all,
    fields(
      run_id = %run_id,
      workflow = workflow.name.as_deref().unwrap_or(""),
    )
  )]
  pub async fn execute(
    &self,
    run_id: &str,
    workflow: &Workflow,
    config: &RunConfig,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, OrchestratorError> {
    config.validate()?;

    let run = Arc::new(RunContext {
      run_id: run_id.to_string(),
      registry: self.registry.clone(),
      store: self.store.clone(),
      notifier: self.notifier.clone(),
      config: config.clone(),
      initial_inputs: workflow.initial_inputs.clone(),
      permits: Arc::new(Semaphore::new(config.max_concurrency)),
      cancel,
    });

    info!(
      nodes = workflow.nodes.len(),
      max_concurrency = config.max_concurrency,
      failure_policy = %config.failure_policy,
      "run_started"
    );
    run.notify(ExecutionEvent::RunStarted {
      run_id: run_id.to_string(),
      nodes: workflow.nodes.len(),
    });

    let result = self.run_loop(&run, workflow).await;

    let status = match &result {
      Ok(outcome) => {
        info!(status = %outcome.status, waves = outcome.waves, "run_finished");
        outcome.status
      }
      Err(OrchestratorError::Cancelled) => {
        warn!("run_cancelled");
        RunStatus::Cancelled
      }
      Err(e) => {
        error!(error = %e, "run_failed");
        RunStatus::Failed
      }
    };
    run.notify(ExecutionEvent::RunFinished {
      run_id: run_id.to_string(),
      status,
    });

    result
  }

  async fn run_loop(
    &self,
    run: &Arc<RunContext>,
    workflow: &Workflow,
  ) -> Result<RunOutcome, OrchestratorError> {
    let mut state = WaveState::default();
    let mut phase = Phase::Initializing;

    loop {
      phase = match phase {
        Phase::Initializing => {
          for node_id in workflow.nodes.keys() {
            let predecessors = workflow.graph().predecessors(node_id).clone();
            let record = NodeExecution::new(node_id.clone(), predecessors);
            run.publish(&record).await;
            state.pending.insert(node_id.clone());
            state.records.insert(node_id.clone(), record);
          }
          Phase::Dispatching
        }

        Phase::Dispatching => {
          if run.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
          }
          if state.pending.is_empty() {
            Phase::Done
          } else {
            let runnable = self.runnable(workflow, &state);
            if runnable.is_empty() {
              Phase::Deadlocked(state.blocked(workflow))
            } else {
              Phase::Draining(self.dispatch(run, workflow, &mut state, runnable).await?)
            }
          }
        }

        Phase::Draining(handles) => {
          let joined = futures::future::join_all(handles).await;
          for result in joined {
            let (record, outcome) = result.map_err(|e| OrchestratorError::Internal {
              message: format!("node task join error: {}", e),
            })?;
            state.finish(record, outcome);
          }
          run.notify(ExecutionEvent::WaveCompleted {
            run_id: run.run_id.clone(),
            wave: state.wave,
          });
          state.wave += 1;
          Phase::Dispatching
        }

        Phase::Done => {
          let status = if state.failed.is_empty() {
            RunStatus::Completed
          } else {
            RunStatus::Failed
          };
          return Ok(RunOutcome {
            run_id: run.run_id.clone(),
            status,
            nodes: state
              .records
              .iter()
              .map(|(id, record)| (id.clone(), record.report()))
              .collect(),
            waves: state.wave,
          });
        }

        Phase::Deadlocked(blocked) => {
          error!(blocked = %blocked, "dependency deadlock");
          return Err(OrchestratorError::Deadlock(blocked));
        }
      };
    }
  }

  /// Pending nodes whose predecessors have all finished.
  fn runnable(&self, workflow: &Workflow, state: &WaveState) -> Vec<String> {
    state
      .pending
      .iter()
      .filter(|id| {
        workflow
          .graph()
          .predecessors(id)
          .iter()
          .all(|p| state.finished.contains(p))
      })
      .cloned()
      .collect()
  }

  /// Start one wave. Nodes cascaded from a failed predecessor finish
  /// immediately; the rest are spawned.
  async fn dispatch(
    &self,
    run: &Arc<RunContext>,
    workflow: &Workflow,
    state: &mut WaveState,
    runnable: Vec<String>,
  ) -> Result<Vec<JoinHandle<ExecutorOutput>>, OrchestratorError> {
    info!(wave = state.wave, ready_nodes = ?runnable, "dispatching wave");
    run.notify(ExecutionEvent::WaveStarted {
      run_id: run.run_id.clone(),
      wave: state.wave,
      node_ids: runnable.clone(),
    });

    let mut handles = Vec::with_capacity(runnable.len());
    for node_id in runnable {
      state.pending.remove(&node_id);
      let mut record = state
        .records
        .remove(&node_id)
        .ok_or_else(|| OrchestratorError::Internal {
          message: format!("no record for node '{}'", node_id),
        })?;

      if run.config.failure_policy == FailurePolicy::Cascade {
        let failed_upstream = record
          .predecessors
          .iter()
          .find(|p| state.failed.contains(*p))
          .cloned();
        if let Some(upstream) = failed_upstream {
          let err = NodeError::UpstreamFailed {
            node_id: node_id.clone(),
            upstream,
          };
          warn!(node_id = %node_id, error = %err, "skipping node");
          record.fail(err.to_string());
          run.publish(&record).await;
          run.notify(ExecutionEvent::NodeFailed {
            run_id: run.run_id.clone(),
            node_id: node_id.clone(),
            error: err.to_string(),
          });
          state.finish(record, Err(err));
          continue;
        }
      }

      let node = workflow
        .get_node(&node_id)
        .cloned()
        .ok_or_else(|| OrchestratorError::Internal {
          message: format!("node '{}' not in workflow", node_id),
        })?;
      let upstream = record
        .predecessors
        .iter()
        .filter_map(|p| state.results.get(p).cloned())
        .collect();

      let executor = NodeExecutor {
        run: run.clone(),
        node,
        upstream,
      };
      handles.push(tokio::spawn(executor.execute(record)));
    }

    Ok(handles)
  }
}
