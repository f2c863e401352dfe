//! Loom Agents
//!
//! Reference agent implementations shipped with loom so that workflows can be
//! run end to end:
//!
//! - [`Calculator`]: `add`, `subtract`, `multiply`, `divide`, and `calculator`
//!   (operation chosen by input)
//! - [`HttpFetcher`]: `data_fetcher`
//! - [`ChartRenderer`]: `chart`

mod calculator;
mod chart;
mod error;
mod fetch;

pub use calculator::{Calculator, Operation};
pub use chart::ChartRenderer;
pub use error::BuiltinError;
pub use fetch::HttpFetcher;

use loom_agent::{AgentRegistry, RegistryError};

/// Register every built-in agent under its agent type.
pub fn register_builtin(registry: &mut AgentRegistry) -> Result<(), RegistryError> {
  for op in Operation::ALL {
    registry.register(op.name(), Calculator::new(op))?;
  }
  registry.register("calculator", Calculator::dynamic())?;
  registry.register("data_fetcher", HttpFetcher::new())?;
  registry.register("chart", ChartRenderer::new())?;
  Ok(())
}

/// A registry holding only the built-in agents.
pub fn builtin_registry() -> Result<AgentRegistry, RegistryError> {
  let mut registry = AgentRegistry::new();
  register_builtin(&mut registry)?;
  Ok(registry)
}
