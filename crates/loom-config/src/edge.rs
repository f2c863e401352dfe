use serde::{Deserialize, Serialize};

/// A directed dependency: `to` may only run after `from` has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
  #[serde(alias = "from_")]
  pub from: String,
  pub to: String,
}

impl EdgeDef {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
    }
  }
}
