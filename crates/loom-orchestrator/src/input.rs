//! Input resolution for a node about to execute.

use loom_config::Mapping;
use serde_json::Value;

use crate::record::NodeEnvelope;

/// Build the input mapping for a node.
///
/// Layers are applied in order, later layers winning on key collisions:
/// 1. the run's initial inputs
/// 2. one entry per completed predecessor, keyed by its id and holding the
///    predecessor's output mapping
/// 3. the node's own params
pub fn resolve_inputs<'a, I>(initial: &Mapping, upstream: I, params: &Mapping) -> Mapping
where
  I: IntoIterator<Item = &'a NodeEnvelope>,
{
  let mut inputs = initial.clone();

  for envelope in upstream {
    inputs.insert(
      envelope.node_id.clone(),
      Value::Object(envelope.result.clone()),
    );
  }

  for (key, value) in params {
    inputs.insert(key.clone(), value.clone());
  }

  inputs
}
