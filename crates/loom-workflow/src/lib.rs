//! Loom Workflow
//!
//! This crate provides the validated workflow representation for loom.
//! A [`Workflow`] is built from a [`loom_config::WorkflowDef`] and is ready to
//! be handed to the scheduler.
//!
//! Key differences from `loom-config`:
//! - Node ids are unique and non-empty
//! - Every edge references known nodes
//! - Each node's predecessor set is computed once and fixed for the run
//!
//! Cycles are deliberately not rejected here. The scheduler detects them at
//! run time as a wave with nothing runnable.

mod error;
mod graph;
mod workflow;

pub use error::WorkflowError;
pub use graph::{Graph, Layering};
pub use workflow::Workflow;
