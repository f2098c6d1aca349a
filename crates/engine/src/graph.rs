//! Adjacency representation, cycle detection, and Kahn's-algorithm
//! topological sort with insertion-order tie-breaking.

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::Node;

use crate::error::GraphError;
use crate::models::Edge;

/// Owns the validated node/edge shape of one workflow payload and exposes
/// the single operation the engine needs from it: a topological order.
pub struct Graph {
    /// Insertion order of node ids, as they appeared in the payload.
    order: Vec<String>,
    nodes: HashMap<String, Node>,
    /// Outgoing edges per source node id, in declaration order.
    outgoing: HashMap<String, Vec<Edge>>,
    /// Incoming-edge count per node id (used to seed Kahn's algorithm).
    indegree: HashMap<String, usize>,
}

impl Graph {
    /// Validates invariant 1 from the spec (every edge endpoint exists, no
    /// duplicate node ids) and builds the adjacency structure. Does not
    /// detect cycles — that happens lazily in [`Graph::topological_sort`].
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, GraphError> {
        let mut order = Vec::with_capacity(nodes.len());
        let mut node_map = HashMap::with_capacity(nodes.len());
        let mut indegree = HashMap::with_capacity(nodes.len());
        let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();

        for node in nodes {
            if node_map.contains_key(&node.id) {
                return Err(GraphError::DuplicateNodeId(node.id.clone()));
            }
            order.push(node.id.clone());
            node_map.insert(node.id.clone(), node.clone());
            indegree.insert(node.id.clone(), 0);
            outgoing.insert(node.id.clone(), Vec::new());
        }

        for edge in edges {
            if !node_map.contains_key(&edge.source) {
                return Err(GraphError::UnknownNodeReference { node_id: edge.source.clone(), side: "source" });
            }
            if !node_map.contains_key(&edge.target) {
                return Err(GraphError::UnknownNodeReference { node_id: edge.target.clone(), side: "target" });
            }
            *indegree.get_mut(&edge.target).unwrap() += 1;
            outgoing.get_mut(&edge.source).unwrap().push(edge.clone());
        }

        Ok(Self { order, nodes: node_map, outgoing, indegree })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().map(move |id| &self.nodes[id])
    }

    /// Incoming edges into `node_id`, in the order they were declared in
    /// the payload.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        let mut result = Vec::new();
        for source_id in &self.order {
            if let Some(edges) = self.outgoing.get(source_id) {
                for edge in edges {
                    if edge.target == node_id {
                        result.push(edge);
                    }
                }
            }
        }
        result
    }

    pub fn outgoing_edges(&self, node_id: &str) -> &[Edge] {
        self.outgoing.get(node_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// True if `node_id` has no outgoing edges — a terminal node.
    pub fn is_terminal(&self, node_id: &str) -> bool {
        self.outgoing.get(node_id).map(|v| v.is_empty()).unwrap_or(true)
    }

    /// Kahn's algorithm: repeatedly pop zero-indegree nodes, preferring the
    /// one that appeared earliest in the payload among current candidates,
    /// so equal-indegree ties resolve deterministically and reproducibly.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut indegree = self.indegree.clone();
        let mut ready: VecDeque<String> = VecDeque::new();
        let position: HashMap<&str, usize> = self.order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

        for id in &self.order {
            if indegree[id] == 0 {
                ready.push_back(id.clone());
            }
        }

        let mut sorted = Vec::with_capacity(self.order.len());
        let mut visited: HashSet<String> = HashSet::new();

        while !ready.is_empty() {
            // Stable pick: among all currently-ready nodes, take the one
            // with the smallest original insertion index.
            let mut candidates: Vec<String> = ready.drain(..).collect();
            candidates.sort_by_key(|id| position[id.as_str()]);
            let picked = candidates.remove(0);
            ready.extend(candidates);

            visited.insert(picked.clone());
            sorted.push(picked.clone());

            for edge in self.outgoing.get(&picked).into_iter().flatten() {
                let entry = indegree.get_mut(&edge.target).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    ready.push_back(edge.target.clone());
                }
            }
        }

        if sorted.len() != self.order.len() {
            return Err(GraphError::CycleDetected);
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> Node {
        Node { id: id.to_string(), kind: "number".to_string(), data: json!({ "value": 1 }) }
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge { source: source.to_string(), target: target.to_string(), source_handle: None, condition: None }
    }

    #[test]
    fn sorts_a_simple_chain() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let graph = Graph::build(&nodes, &edges).unwrap();
        assert_eq!(graph.topological_sort().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn tie_breaks_by_insertion_order() {
        // b and c both depend only on a; b was declared before c.
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("a", "c")];
        let graph = Graph::build(&nodes, &edges).unwrap();
        assert_eq!(graph.topological_sort().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_cycles() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b"), edge("b", "a")];
        let graph = Graph::build(&nodes, &edges).unwrap();
        assert_eq!(graph.topological_sort(), Err(GraphError::CycleDetected));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let nodes = vec![node("a"), node("a")];
        assert_eq!(Graph::build(&nodes, &[]).unwrap_err(), GraphError::DuplicateNodeId("a".to_string()));
    }

    #[test]
    fn rejects_unknown_edge_endpoints() {
        let nodes = vec![node("a")];
        let edges = vec![edge("a", "missing")];
        assert!(matches!(
            Graph::build(&nodes, &edges),
            Err(GraphError::UnknownNodeReference { side: "target", .. })
        ));
    }
}
