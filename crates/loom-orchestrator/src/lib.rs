//! Loom Orchestrator
//!
//! Executes workflows of agents as a directed acyclic graph.
//!
//! A submitted [`loom_config::WorkflowDef`] is validated into a
//! [`loom_workflow::Workflow`], given a run id, and handed to the
//! [`Scheduler`]. The scheduler dispatches nodes in waves: every node whose
//! predecessors have all finished runs concurrently with the rest of its wave,
//! and the next wave starts only when the current one has fully drained.
//!
//! Each node is executed with:
//! - inputs layered from the run's initial inputs, its predecessors' outputs,
//!   and its own params
//! - a hard per-attempt timeout and `max_retries + 1` attempts with backoff
//! - a run-wide concurrency bound on in-flight agent calls
//!
//! Progress is written to a [`loom_store::RunStore`] as it happens and
//! emitted as [`ExecutionEvent`]s through an [`ExecutionNotifier`].
//!
//! A run whose remaining nodes can never become runnable (a cycle, or a
//! dependency on a node that never finishes) fails with
//! [`OrchestratorError::Deadlock`] instead of hanging.

mod artifacts;
mod error;
mod events;
mod executor;
mod input;
mod record;
mod scheduler;
mod service;

pub use error::{BlockedNodes, NodeError, OrchestratorError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use input::resolve_inputs;
pub use record::{NodeEnvelope, NodeExecution};
pub use scheduler::{RunOutcome, Scheduler};
pub use service::Orchestrator;
