//! Agent invocation with a hard timeout.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::Mapping;
use crate::agent::{Agent, AgentContext};
use crate::error::AgentError;

/// Adapts one registered agent to the engine's calling convention.
///
/// Cheap to clone; clones share the same agent instance.
#[derive(Clone)]
pub struct AgentInvoker {
  name: String,
  agent: Arc<dyn Agent>,
}

impl AgentInvoker {
  pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
    Self {
      name: name.into(),
      agent,
    }
  }

  /// The agent type this invoker was registered under.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Call the agent once.
  ///
  /// If the agent does not finish within `timeout` its future is dropped and
  /// `AgentError::Timeout` is returned.
  #[instrument(
    name = "agent_invoke",
    skip(self, inputs, ctx),
    fields(
      agent = %self.name,
      node_id = %ctx.node_id,
      attempt = ctx.attempt,
    )
  )]
  pub async fn invoke(
    &self,
    inputs: Mapping,
    ctx: &AgentContext,
    timeout: Duration,
  ) -> Result<Mapping, AgentError> {
    match tokio::time::timeout(timeout, self.agent.run(inputs, ctx)).await {
      Ok(Ok(output)) => {
        debug!(keys = output.len(), "agent returned");
        Ok(output)
      }
      Ok(Err(source)) => {
        warn!(error = %source, "agent failed");
        Err(AgentError::Failed {
          agent: self.name.clone(),
          source,
        })
      }
      Err(_) => {
        warn!(timeout_ms = timeout.as_millis() as u64, "agent timed out");
        Err(AgentError::Timeout {
          agent: self.name.clone(),
          timeout,
        })
      }
    }
  }
}

impl fmt::Debug for AgentInvoker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AgentInvoker")
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::agent::AgentFailure;
  use async_trait::async_trait;
  use serde_json::json;

  struct Echo;

  #[async_trait]
  impl Agent for Echo {
    async fn run(&self, inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
      Ok(inputs)
    }
  }

  struct Broken;

  #[async_trait]
  impl Agent for Broken {
    async fn run(&self, _inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
      Err("boom".into())
    }
  }

  struct Sleepy(Duration);

  #[async_trait]
  impl Agent for Sleepy {
    async fn run(&self, _inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
      tokio::time::sleep(self.0).await;
      Ok(Mapping::new())
    }
  }

  fn inputs() -> Mapping {
    let mut inputs = Mapping::new();
    inputs.insert("x".to_string(), json!(1));
    inputs
  }

  #[tokio::test]
  async fn test_invoke_passes_output_through() {
    let invoker = AgentInvoker::new("echo", Arc::new(Echo));
    let ctx = AgentContext::detached("n1");

    let output = invoker
      .invoke(inputs(), &ctx, Duration::from_secs(1))
      .await
      .unwrap();

    assert_eq!(output["x"], json!(1));
    assert_eq!(invoker.name(), "echo");
  }

  #[tokio::test]
  async fn test_invoke_wraps_agent_failure() {
    let invoker = AgentInvoker::new("broken", Arc::new(Broken));
    let ctx = AgentContext::detached("n1");

    let err = invoker
      .invoke(inputs(), &ctx, Duration::from_secs(1))
      .await
      .unwrap_err();

    assert!(!err.is_timeout());
    assert_eq!(err.agent(), "broken");
    assert_eq!(err.to_string(), "agent 'broken' failed: boom");
  }

  #[tokio::test(start_paused = true)]
  async fn test_invoke_times_out() {
    let invoker = AgentInvoker::new("sleepy", Arc::new(Sleepy(Duration::from_secs(60))));
    let ctx = AgentContext::detached("n1");

    let err = invoker
      .invoke(inputs(), &ctx, Duration::from_secs(5))
      .await
      .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(
      err,
      AgentError::Timeout { timeout, .. } if timeout == Duration::from_secs(5)
    ));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invoke_within_timeout_succeeds() {
    let invoker = AgentInvoker::new("sleepy", Arc::new(Sleepy(Duration::from_secs(2))));
    let ctx = AgentContext::detached("n1");

    let result = invoker
      .invoke(inputs(), &ctx, Duration::from_secs(5))
      .await;

    assert!(result.is_ok());
  }
}
