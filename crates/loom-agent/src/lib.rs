//! Loom Agent
//!
//! Every unit of work in a loom workflow is an [`Agent`]: given an input
//! mapping it asynchronously produces an output mapping or fails. Agents are
//! registered by name in an [`AgentRegistry`] before any run starts, and the
//! engine always calls them through an [`AgentInvoker`], which enforces a hard
//! per-call timeout and normalizes failures into [`AgentError`].
//!
//! The invoker does not retry. Retry policy belongs to the orchestrator.

mod agent;
mod error;
mod invoker;
mod registry;

pub use agent::{Agent, AgentContext, AgentFailure, ArtifactSink, DiscardArtifacts};
pub use error::{AgentError, RegistryError};
pub use invoker::AgentInvoker;
pub use loom_config::Mapping;
pub use registry::AgentRegistry;
