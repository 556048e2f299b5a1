//! Adjacency map over the applicant graph

use super::edges::{Edge, NodeId};
use std::collections::BTreeMap;

/// Node -> successors, keyed only by nodes with at least one outgoing edge.
///
/// Successor lists keep one entry per edge in the order edges were supplied,
/// duplicates included. Keys iterate in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    successors: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    pub fn from_edges(edges: &[Edge]) -> Self {
        let mut successors: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for edge in edges {
            successors
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        Self { successors }
    }

    /// Successors of `node`, empty when it has no outgoing edge
    pub fn successors(&self, node: &str) -> &[NodeId] {
        self.successors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_successors(&self, node: &str) -> bool {
        self.successors.contains_key(node)
    }

    /// Traversal start points in ascending order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.successors.keys()
    }

    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_is_sources_only() {
        let adj = Adjacency::from_edges(&[Edge::new("b", "c", 1), Edge::new("a", "b", 1)]);

        assert_eq!(adj.node_count(), 2);
        assert!(adj.has_successors("a"));
        assert!(!adj.has_successors("c"));
        assert!(adj.successors("c").is_empty());
        assert_eq!(adj.nodes().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicates_and_order_are_kept() {
        let adj = Adjacency::from_edges(&[
            Edge::new("a", "z", 1),
            Edge::new("a", "b", 2),
            Edge::new("a", "z", 3),
        ]);

        assert_eq!(adj.successors("a"), ["z", "b", "z"]);
    }
}
