use std::time::Duration;

use async_trait::async_trait;
use loom_agent::{Agent, AgentContext, AgentFailure};
use loom_config::Mapping;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `url` with a GET request.
///
/// Output: `{"status_code": u16, "text": body, "json": parsed body or null}`.
/// A missing url is reported in the output rather than as a failure.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Agent for HttpFetcher {
  async fn run(&self, inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
    let Some(url) = inputs.get("url").and_then(Value::as_str) else {
      let mut output = Mapping::new();
      output.insert("error".to_string(), json!("missing url"));
      return Ok(output);
    };

    let response = self
      .client
      .get(url)
      .timeout(REQUEST_TIMEOUT)
      .send()
      .await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    debug!(url, status, bytes = text.len(), "fetched");

    // Try to parse body as JSON, fall back to null
    let parsed = serde_json::from_str(&text).unwrap_or(Value::Null);

    let mut output = Mapping::new();
    output.insert("status_code".to_string(), json!(status));
    output.insert("text".to_string(), Value::String(text));
    output.insert("json".to_string(), parsed);
    Ok(output)
  }
}
