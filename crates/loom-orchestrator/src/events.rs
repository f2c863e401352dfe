//! Execution events and notifiers for observability.
//!
//! Events are emitted while a run executes so consumers can observe progress
//! without polling the store: stream to a UI, record in tests, log, etc.

use loom_store::RunStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The run left the queue and its nodes were registered.
  RunStarted { run_id: String, nodes: usize },

  /// A wave of runnable nodes was dispatched.
  WaveStarted {
    run_id: String,
    wave: usize,
    node_ids: Vec<String>,
  },

  /// A node started its first attempt.
  NodeStarted { run_id: String, node_id: String },

  /// An attempt failed and the node will be retried after `delay_ms`.
  NodeRetrying {
    run_id: String,
    node_id: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },

  /// A node completed successfully.
  NodeCompleted {
    run_id: String,
    node_id: String,
    result: serde_json::Value,
  },

  /// A node failed.
  NodeFailed {
    run_id: String,
    node_id: String,
    error: String,
  },

  /// Every node of a wave has finished.
  WaveCompleted { run_id: String, wave: usize },

  /// The run reached a terminal status.
  RunFinished { run_id: String, status: RunStatus },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls the scheduler; volume is a few
/// events per node.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
