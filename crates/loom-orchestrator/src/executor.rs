//! Single-node execution: input resolution, retries, backoff, and timeouts.

use std::sync::Arc;
use std::time::Duration;

use loom_agent::{AgentContext, AgentInvoker, AgentRegistry, ArtifactSink};
use loom_config::{Mapping, NodeDef, RunConfig};
use loom_store::RunStore;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::artifacts::StoreArtifacts;
use crate::error::NodeError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::input::resolve_inputs;
use crate::record::{NodeEnvelope, NodeExecution};

/// Everything the nodes of one run share.
pub(crate) struct RunContext {
  pub(crate) run_id: String,
  pub(crate) registry: Arc<AgentRegistry>,
  pub(crate) store: Arc<dyn RunStore>,
  pub(crate) notifier: Arc<dyn ExecutionNotifier>,
  pub(crate) config: RunConfig,
  pub(crate) initial_inputs: Mapping,
  /// Bounds in-flight agent calls for the whole run.
  pub(crate) permits: Arc<Semaphore>,
  pub(crate) cancel: CancellationToken,
}

impl RunContext {
  /// Push a record's current state to the store so pollers can see it.
  pub(crate) async fn publish(&self, record: &NodeExecution) {
    if let Err(e) = self
      .store
      .set_node_result(&self.run_id, &record.node_id, record.report())
      .await
    {
      warn!(
        run_id = %self.run_id,
        node_id = %record.node_id,
        error = %e,
        "failed to record node state"
      );
    }
  }

  pub(crate) fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }
}

/// The record handed back to the scheduler along with the node's outcome.
pub(crate) type ExecutorOutput = (NodeExecution, Result<NodeEnvelope, NodeError>);

/// Runs one node of one run.
pub(crate) struct NodeExecutor {
  pub(crate) run: Arc<RunContext>,
  pub(crate) node: NodeDef,
  /// Envelopes of the predecessors that completed.
  pub(crate) upstream: Vec<Arc<NodeEnvelope>>,
}

impl NodeExecutor {
  /// Drive the node to a terminal status.
  ///
  /// The record is owned by this call until it returns; every state change is
  /// published to the store as it happens.
  #[instrument(
    name = "node_execute",
    skip(self, record),
    fields(
      run_id = %self.run.run_id,
      node_id = %self.node.id,
    )
  )]
  pub(crate) async fn execute(self, mut record: NodeExecution) -> ExecutorOutput {
    record.start();
    self.run.publish(&record).await;
    self.run.notify(ExecutionEvent::NodeStarted {
      run_id: self.run.run_id.clone(),
      node_id: self.node.id.clone(),
    });

    let outcome = self.attempt_all(&mut record).await;

    match &outcome {
      Ok(envelope) => {
        record.complete(envelope);
        info!(retries = record.retries, "node_completed");
        self.run.notify(ExecutionEvent::NodeCompleted {
          run_id: self.run.run_id.clone(),
          node_id: self.node.id.clone(),
          result: record.result.clone().unwrap_or_default(),
        });
      }
      Err(e) => {
        record.fail(e.to_string());
        warn!(retries = record.retries, error = %e, "node_failed");
        self.run.notify(ExecutionEvent::NodeFailed {
          run_id: self.run.run_id.clone(),
          node_id: self.node.id.clone(),
          error: e.to_string(),
        });
      }
    }

    self.run.publish(&record).await;
    (record, outcome)
  }

  async fn attempt_all(&self, record: &mut NodeExecution) -> Result<NodeEnvelope, NodeError> {
    let invoker = self.resolve_agent()?;
    let inputs = resolve_inputs(
      &self.run.initial_inputs,
      self.upstream.iter().map(Arc::as_ref),
      &self.node.params,
    );
    let max_retries = self.node.max_retries.unwrap_or(self.run.config.max_retries);
    let timeout = self
      .node
      .timeout_ms
      .map(Duration::from_millis)
      .unwrap_or_else(|| self.run.config.timeout());
    let cancel = &self.run.cancel;

    // Held until the node finishes, including backoff sleeps.
    let _permit = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(self.cancelled()),
      permit = self.run.permits.clone().acquire_owned() => {
        permit.map_err(|_| self.cancelled())?
      }
    };

    let artifacts: Arc<dyn ArtifactSink> = Arc::new(StoreArtifacts::new(
      self.run.store.clone(),
      self.run.run_id.clone(),
    ));
    let base_ctx = AgentContext::new(&self.run.run_id, &self.node.id, artifacts);

    let mut attempt = 0;
    loop {
      let ctx = base_ctx.clone().with_attempt(attempt);
      let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(self.cancelled()),
        result = invoker.invoke(inputs.clone(), &ctx, timeout) => result,
      };

      let source = match result {
        Ok(output) => {
          return Ok(NodeEnvelope {
            result: output,
            node_id: self.node.id.clone(),
            agent_type: invoker.name().to_string(),
          });
        }
        Err(source) => source,
      };

      if attempt >= max_retries {
        return Err(NodeError::Exhausted {
          node_id: self.node.id.clone(),
          retries: attempt,
          source,
        });
      }

      attempt += 1;
      record.retries = attempt;
      let delay = self.run.config.backoff_delay(attempt);
      warn!(
        attempt,
        max_retries,
        delay_ms = delay.as_millis() as u64,
        error = %source,
        "attempt failed, retrying"
      );
      self.run.publish(record).await;
      self.run.notify(ExecutionEvent::NodeRetrying {
        run_id: self.run.run_id.clone(),
        node_id: self.node.id.clone(),
        attempt,
        delay_ms: delay.as_millis() as u64,
        error: source.to_string(),
      });

      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(self.cancelled()),
        _ = tokio::time::sleep(delay) => {}
      }
    }
  }

  /// Look up the node's agent. Failures here are configuration errors and
  /// are never retried.
  fn resolve_agent(&self) -> Result<AgentInvoker, NodeError> {
    let agent_type = self
      .node
      .agent_type
      .as_deref()
      .filter(|t| !t.is_empty())
      .ok_or_else(|| NodeError::MissingAgentType {
        node_id: self.node.id.clone(),
      })?;

    self
      .run
      .registry
      .get(agent_type)
      .cloned()
      .ok_or_else(|| NodeError::UnknownAgentType {
        node_id: self.node.id.clone(),
        agent_type: agent_type.to_string(),
        available: self.run.registry.names().join(", "),
      })
  }

  fn cancelled(&self) -> NodeError {
    NodeError::Cancelled {
      node_id: self.node.id.clone(),
    }
  }
}
