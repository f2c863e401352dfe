//! Loom Config
//!
//! This crate contains the serializable workflow configuration types for loom.
//! These types represent workflow definitions as they are submitted, before the
//! engine validates them and builds the dependency graph.
//!
//! Configuration can be loaded from:
//! - JSON files (via the CLI, `loom run workflow.json`)
//! - In-process submissions through the orchestrator API
//!
//! Run-level tuning (retries, timeouts, concurrency) lives in [`RunConfig`] and
//! may be embedded in a workflow file or supplied separately.

mod edge;
mod enums;
mod node;
mod run_config;
mod workflow;

pub use edge::EdgeDef;
pub use enums::{FailurePolicy, RetryBackoff};
pub use node::NodeDef;
pub use run_config::{ConfigError, RunConfig};
pub use workflow::WorkflowDef;

/// A string-keyed JSON mapping. Used for node params, initial inputs, and
/// agent inputs/outputs.
pub type Mapping = serde_json::Map<String, serde_json::Value>;
