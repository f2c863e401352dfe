use std::collections::{BTreeMap, HashSet};

use loom_config::{Mapping, NodeDef, RunConfig, WorkflowDef};

use crate::error::WorkflowError;
use crate::graph::Graph;

/// A validated workflow ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
  pub name: Option<String>,
  pub nodes: BTreeMap<String, NodeDef>,
  pub edges: Vec<(String, String)>,
  pub initial_inputs: Mapping,
  pub config: Option<RunConfig>,
  graph: Graph,
}

impl Workflow {
  /// Validate a definition and build its dependency graph.
  pub fn new(def: WorkflowDef) -> Result<Self, WorkflowError> {
    let mut nodes = BTreeMap::new();
    for (index, node) in def.nodes.into_iter().enumerate() {
      if node.id.trim().is_empty() {
        return Err(WorkflowError::EmptyNodeId { index });
      }
      if nodes.contains_key(&node.id) {
        return Err(WorkflowError::DuplicateNode(node.id));
      }
      if node.timeout_ms == Some(0) {
        return Err(WorkflowError::ZeroNodeTimeout(node.id));
      }
      nodes.insert(node.id.clone(), node);
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::with_capacity(def.edges.len());
    for edge in def.edges {
      if !nodes.contains_key(&edge.from) || !nodes.contains_key(&edge.to) {
        return Err(WorkflowError::InvalidEdge {
          from: edge.from,
          to: edge.to,
        });
      }
      let pair = (edge.from, edge.to);
      if seen.insert(pair.clone()) {
        edges.push(pair);
      }
    }

    let graph = Graph::build(nodes.keys().map(String::as_str), &edges);

    Ok(Self {
      name: def.name,
      nodes,
      edges,
      initial_inputs: def.initial_inputs,
      config: def.config,
      graph,
    })
  }

  /// The dependency graph, fixed for the lifetime of the workflow.
  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.nodes.get(node_id)
  }
}

impl TryFrom<WorkflowDef> for Workflow {
  type Error = WorkflowError;

  fn try_from(def: WorkflowDef) -> Result<Self, Self::Error> {
    Self::new(def)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use loom_config::EdgeDef;

  fn def(nodes: &[&str], edges: &[(&str, &str)]) -> WorkflowDef {
    WorkflowDef::new(
      nodes.iter().map(|id| NodeDef::new(*id, "noop")).collect(),
      edges.iter().map(|(a, b)| EdgeDef::new(*a, *b)).collect(),
    )
  }

  #[test]
  fn test_valid_workflow_builds_graph() {
    let workflow = Workflow::new(def(&["a", "b"], &[("a", "b"), ("a", "b")])).unwrap();

    assert_eq!(workflow.nodes.len(), 2);
    assert_eq!(workflow.edges.len(), 1);
    assert!(workflow.graph().predecessors("b").contains("a"));
    assert_eq!(workflow.get_node("a").unwrap().agent_type.as_deref(), Some("noop"));
  }

  #[test]
  fn test_duplicate_node_rejected() {
    let err = Workflow::new(def(&["a", "a"], &[])).unwrap_err();
    assert_eq!(err, WorkflowError::DuplicateNode("a".to_string()));
  }

  #[test]
  fn test_empty_node_id_rejected() {
    let err = Workflow::new(def(&["a", " "], &[])).unwrap_err();
    assert_eq!(err, WorkflowError::EmptyNodeId { index: 1 });
  }

  #[test]
  fn test_zero_node_timeout_rejected() {
    let mut def = def(&["a", "b"], &[("a", "b")]);
    def.nodes[1] = NodeDef::new("b", "noop").with_timeout_ms(0);

    let err = Workflow::new(def).unwrap_err();
    assert_eq!(err, WorkflowError::ZeroNodeTimeout("b".to_string()));

    let ok = WorkflowDef::new(vec![NodeDef::new("a", "noop").with_timeout_ms(1)], vec![]);
    assert!(Workflow::new(ok).is_ok());
  }

  #[test]
  fn test_edge_to_unknown_node_is_config_error() {
    let err = Workflow::new(def(&["a"], &[("a", "ghost")])).unwrap_err();
    assert_eq!(
      err,
      WorkflowError::InvalidEdge {
        from: "a".to_string(),
        to: "ghost".to_string(),
      }
    );

    let err = Workflow::new(def(&["a"], &[("ghost", "a")])).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidEdge { .. }));
  }

  #[test]
  fn test_cycles_are_not_rejected() {
    let workflow = Workflow::new(def(&["a", "b"], &[("a", "b"), ("b", "a")])).unwrap();
    assert!(workflow.graph().roots().is_empty());
  }
}
