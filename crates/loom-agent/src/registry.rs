use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::RegistryError;
use crate::invoker::AgentInvoker;

/// Name -> agent lookup.
///
/// Built before a run starts and shared read-only between runs.
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
  agents: HashMap<String, AgentInvoker>,
}

impl AgentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an agent under `name`. Names are unique.
  pub fn register<A>(&mut self, name: impl Into<String>, agent: A) -> Result<(), RegistryError>
  where
    A: Agent + 'static,
  {
    self.register_shared(name, Arc::new(agent))
  }

  /// Register an already shared agent, e.g. one instance under several names.
  pub fn register_shared(
    &mut self,
    name: impl Into<String>,
    agent: Arc<dyn Agent>,
  ) -> Result<(), RegistryError> {
    let name = name.into();
    if self.agents.contains_key(&name) {
      return Err(RegistryError::AlreadyRegistered(name));
    }
    self
      .agents
      .insert(name.clone(), AgentInvoker::new(name, agent));
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&AgentInvoker> {
    self.agents.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.agents.contains_key(name)
  }

  /// Registered agent types, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.agents.len()
  }

  pub fn is_empty(&self) -> bool {
    self.agents.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Mapping;
  use crate::agent::{AgentContext, AgentFailure};
  use async_trait::async_trait;

  struct Noop;

  #[async_trait]
  impl Agent for Noop {
    async fn run(&self, _inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
      Ok(Mapping::new())
    }
  }

  #[test]
  fn test_register_and_lookup() {
    let mut registry = AgentRegistry::new();
    registry.register("b", Noop).unwrap();
    registry.register("a", Noop).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.contains("a"));
    assert_eq!(registry.get("b").map(|i| i.name()), Some("b"));
    assert!(registry.get("c").is_none());
    assert_eq!(registry.names(), vec!["a", "b"]);
  }

  #[test]
  fn test_duplicate_name_rejected() {
    let mut registry = AgentRegistry::new();
    registry.register("calc", Noop).unwrap();

    let err = registry.register("calc", Noop).unwrap_err();
    assert_eq!(err, RegistryError::AlreadyRegistered("calc".to_string()));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_shared_instance_under_two_names() {
    let shared: Arc<dyn Agent> = Arc::new(Noop);
    let mut registry = AgentRegistry::new();
    registry.register_shared("one", shared.clone()).unwrap();
    registry.register_shared("two", shared).unwrap();

    assert_eq!(registry.names(), vec!["one", "two"]);
  }
}
