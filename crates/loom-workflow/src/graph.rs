use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

static NO_NODES: BTreeSet<String> = BTreeSet::new();

/// Dependency structure of a workflow.
///
/// Built once per run from the flat node and edge lists. Ordered collections
/// keep every traversal deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
  /// node_id -> distinct ids it depends on.
  predecessors: BTreeMap<String, BTreeSet<String>>,
  /// node_id -> distinct ids depending on it.
  successors: BTreeMap<String, BTreeSet<String>>,
}

/// Static wave layering of a graph: the order in which the scheduler would
/// dispatch nodes if every node finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layering {
  pub waves: Vec<Vec<String>>,
  /// Nodes that can never become runnable, with their missing predecessors.
  pub blocked: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
  /// Build the graph from node ids and `(from, to)` edges.
  ///
  /// Each listed node gets an entry, empty if it has no incoming edges.
  /// Duplicate edges collapse. Edges whose destination is not a listed node
  /// are ignored; an unknown source is kept as a predecessor, which the
  /// scheduler will report as a dependency that never completes.
  pub fn build<'a, I>(node_ids: I, edges: &[(String, String)]) -> Self
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut predecessors: BTreeMap<String, BTreeSet<String>> = node_ids
      .into_iter()
      .map(|id| (id.to_string(), BTreeSet::new()))
      .collect();
    let mut successors: BTreeMap<String, BTreeSet<String>> = predecessors
      .keys()
      .map(|id| (id.clone(), BTreeSet::new()))
      .collect();

    for (from, to) in edges {
      if let Some(deps) = predecessors.get_mut(to) {
        deps.insert(from.clone());
        successors
          .entry(from.clone())
          .or_default()
          .insert(to.clone());
      }
    }

    Self {
      predecessors,
      successors,
    }
  }

  /// All node ids, in sorted order.
  pub fn node_ids(&self) -> impl Iterator<Item = &str> {
    self.predecessors.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.predecessors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.predecessors.is_empty()
  }

  /// Get the ids a node depends on.
  pub fn predecessors(&self, node_id: &str) -> &BTreeSet<String> {
    self.predecessors.get(node_id).unwrap_or(&NO_NODES)
  }

  /// Get the ids that depend on a node.
  pub fn successors(&self, node_id: &str) -> &BTreeSet<String> {
    self.successors.get(node_id).unwrap_or(&NO_NODES)
  }

  /// The full node -> predecessor set mapping.
  pub fn predecessor_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
    &self.predecessors
  }

  /// Nodes with no incoming edges. These are always in the first wave.
  pub fn roots(&self) -> Vec<&str> {
    self
      .predecessors
      .iter()
      .filter(|(_, deps)| deps.is_empty())
      .map(|(id, _)| id.as_str())
      .collect()
  }

  /// Compute the wave layering by repeatedly taking every node whose
  /// predecessors are all in earlier waves.
  pub fn layering(&self) -> Layering {
    let mut pending: BTreeSet<&str> = self.node_ids().collect();
    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut waves = Vec::new();

    while !pending.is_empty() {
      let wave: Vec<&str> = pending
        .iter()
        .copied()
        .filter(|id| {
          self
            .predecessors(id)
            .iter()
            .all(|dep| done.contains(dep.as_str()))
        })
        .collect();

      if wave.is_empty() {
        break;
      }

      for id in &wave {
        pending.remove(id);
        done.insert(*id);
      }
      waves.push(wave.into_iter().map(str::to_string).collect());
    }

    let blocked = pending
      .into_iter()
      .map(|id| {
        let missing = self
          .predecessors(id)
          .iter()
          .filter(|dep| !done.contains(dep.as_str()))
          .cloned()
          .collect();
        (id.to_string(), missing)
      })
      .collect();

    Layering { waves, blocked }
  }
}
