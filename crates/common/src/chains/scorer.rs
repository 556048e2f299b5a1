//! Priority scoring for discovered cycles

use super::edges::{Edge, NodeId, MISSING_PRIORITY};
use std::collections::HashMap;

/// Lookup of the priority on each ordered `(source, target)` pair.
///
/// When the same pair appears more than once the smallest (most preferred)
/// priority is kept, so the score does not depend on row order.
#[derive(Debug, Default)]
pub struct PriorityTable {
    by_pair: HashMap<NodeId, HashMap<NodeId, i32>>,
}

impl PriorityTable {
    pub fn from_edges(edges: &[Edge]) -> Self {
        let mut by_pair: HashMap<NodeId, HashMap<NodeId, i32>> = HashMap::new();
        for edge in edges {
            by_pair
                .entry(edge.source.clone())
                .or_default()
                .entry(edge.target.clone())
                .and_modify(|p| *p = (*p).min(edge.priority))
                .or_insert(edge.priority);
        }
        Self { by_pair }
    }

    pub fn priority(&self, source: &str, target: &str) -> i32 {
        self.by_pair
            .get(source)
            .and_then(|targets| targets.get(target))
            .copied()
            .unwrap_or(MISSING_PRIORITY)
    }

    /// Mean priority over every hop of the cycle, closing hop included.
    /// `None` only for an empty cycle.
    pub fn average(&self, cycle: &[NodeId]) -> Option<f64> {
        if cycle.is_empty() {
            return None;
        }

        let total: i64 = cycle
            .iter()
            .zip(cycle.iter().cycle().skip(1))
            .map(|(from, to)| i64::from(self.priority(from, to)))
            .sum();

        Some(total as f64 / cycle.len() as f64)
    }
}

/// A cycle with its derived score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChain {
    pub users: Vec<NodeId>,
    pub length: usize,
    pub avg_priority: Option<f64>,
}

pub fn score_cycles(table: &PriorityTable, cycles: Vec<Vec<NodeId>>) -> Vec<ScoredChain> {
    cycles
        .into_iter()
        .map(|users| ScoredChain {
            length: users.len(),
            avg_priority: table.average(&users),
            users,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_cycle_average() {
        let table = PriorityTable::from_edges(&[Edge::new("u1", "u2", 1), Edge::new("u2", "u1", 2)]);
        assert_eq!(table.average(&ids(&["u1", "u2"])), Some(1.5));
    }

    #[test]
    fn test_closing_edge_is_counted() {
        let table = PriorityTable::from_edges(&[
            Edge::new("a", "b", 1),
            Edge::new("b", "c", 2),
            Edge::new("c", "a", 6),
        ]);
        assert_eq!(table.average(&ids(&["a", "b", "c"])), Some(3.0));
    }

    #[test]
    fn test_missing_pair_uses_sentinel() {
        let table = PriorityTable::from_edges(&[Edge::new("a", "b", 1)]);
        assert_eq!(table.priority("b", "a"), MISSING_PRIORITY);
        assert_eq!(table.average(&ids(&["a", "b"])), Some(500.0));
    }

    #[test]
    fn test_duplicate_pair_keeps_minimum() {
        let table = PriorityTable::from_edges(&[
            Edge::new("a", "b", 3),
            Edge::new("a", "b", 1),
            Edge::new("a", "b", 2),
        ]);
        assert_eq!(table.priority("a", "b"), 1);
    }

    #[test]
    fn test_empty_cycle_has_no_score() {
        assert_eq!(PriorityTable::default().average(&[]), None);
    }

    #[test]
    fn test_score_cycles_keeps_order() {
        let table = PriorityTable::from_edges(&[
            Edge::new("a", "b", 1),
            Edge::new("b", "a", 1),
            Edge::new("c", "d", 4),
            Edge::new("d", "c", 2),
        ]);
        let scored = score_cycles(&table, vec![ids(&["a", "b"]), ids(&["c", "d"])]);

        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].avg_priority, Some(1.0));
        assert_eq!(scored[1].avg_priority, Some(3.0));
        assert_eq!(scored[1].length, 2);
    }
}
