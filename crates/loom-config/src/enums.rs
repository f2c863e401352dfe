use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  Constant,
  #[default]
  Linear,
  Exponential,
}

/// What happens to the dependents of a node that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
  /// Dependents still run, without the failed node's key in their inputs.
  Contain,
  /// Dependents are marked failed without running their agent.
  #[default]
  Cascade,
}

impl fmt::Display for FailurePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailurePolicy::Contain => f.write_str("contain"),
      FailurePolicy::Cascade => f.write_str("cascade"),
    }
  }
}

impl FromStr for FailurePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "contain" => Ok(FailurePolicy::Contain),
      "cascade" => Ok(FailurePolicy::Cascade),
      other => Err(format!(
        "unknown failure policy '{}' (expected 'contain' or 'cascade')",
        other
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_failure_policy_parse() {
    assert_eq!("contain".parse(), Ok(FailurePolicy::Contain));
    assert_eq!(" Cascade ".parse(), Ok(FailurePolicy::Cascade));
    assert!("halt".parse::<FailurePolicy>().is_err());
  }

  #[test]
  fn test_enum_serde_names() {
    let backoff: RetryBackoff = serde_json::from_str("\"exponential\"").unwrap();
    assert_eq!(backoff, RetryBackoff::Exponential);
    assert_eq!(
      serde_json::to_string(&FailurePolicy::Contain).unwrap(),
      "\"contain\""
    );
  }
}
