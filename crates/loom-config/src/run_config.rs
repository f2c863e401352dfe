//! Run-level execution settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::{FailurePolicy, RetryBackoff};

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("max_concurrency must be at least 1")]
  ZeroConcurrency,

  #[error("timeout_ms must be greater than 0")]
  ZeroTimeout,
}

/// Settings applied to every node of a run unless the node overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
  /// Maximum number of agent calls in flight at once for one run.
  pub max_concurrency: usize,
  /// Retries after the first attempt; a node gets `max_retries + 1` attempts.
  pub max_retries: u32,
  /// Hard limit for a single agent call.
  pub timeout_ms: u64,
  /// Base unit of the delay between attempts.
  pub backoff_ms: u64,
  pub retry_backoff: RetryBackoff,
  pub failure_policy: FailurePolicy,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      max_concurrency: 3,
      max_retries: 2,
      timeout_ms: 30_000,
      backoff_ms: 1_000,
      retry_backoff: RetryBackoff::Linear,
      failure_policy: FailurePolicy::Cascade,
    }
  }
}

impl RunConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_concurrency == 0 {
      return Err(ConfigError::ZeroConcurrency);
    }
    if self.timeout_ms == 0 {
      return Err(ConfigError::ZeroTimeout);
    }
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  /// Delay to wait after the `failures`-th failed attempt (1-based).
  pub fn backoff_delay(&self, failures: u32) -> Duration {
    let failures = u64::from(failures.max(1));
    let ms = match self.retry_backoff {
      RetryBackoff::Constant => self.backoff_ms,
      RetryBackoff::Linear => self.backoff_ms.saturating_mul(failures),
      RetryBackoff::Exponential => {
        let factor = 1u64.checked_shl((failures - 1) as u32).unwrap_or(u64::MAX);
        self.backoff_ms.saturating_mul(factor)
      }
    };
    Duration::from_millis(ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_match_reference_settings() {
    let config = RunConfig::default();
    assert_eq!(config.max_concurrency, 3);
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_config_fills_defaults() {
    let config: RunConfig = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_ms, 1_000);
    assert_eq!(config.failure_policy, FailurePolicy::Cascade);
  }

  #[test]
  fn test_linear_backoff() {
    let config = RunConfig::default();
    assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
    assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
    assert_eq!(config.backoff_delay(3), Duration::from_secs(3));
  }

  #[test]
  fn test_constant_and_exponential_backoff() {
    let mut config = RunConfig {
      backoff_ms: 100,
      retry_backoff: RetryBackoff::Constant,
      ..RunConfig::default()
    };
    assert_eq!(config.backoff_delay(4), Duration::from_millis(100));

    config.retry_backoff = RetryBackoff::Exponential;
    assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
    assert_eq!(config.backoff_delay(3), Duration::from_millis(400));
    assert_eq!(config.backoff_delay(200), Duration::from_millis(u64::MAX));
  }

  #[test]
  fn test_validate_rejects_zero_values() {
    let config = RunConfig {
      max_concurrency: 0,
      ..RunConfig::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));

    let config = RunConfig {
      timeout_ms: 0,
      ..RunConfig::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
  }
}
