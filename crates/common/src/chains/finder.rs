//! Bounded depth-first enumeration of simple directed cycles

use super::adjacency::Adjacency;
use super::canonical::Deduplicator;
use super::edges::NodeId;
use crate::errors::{AppError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Effective maximum cycle length for one search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MaxLen(usize);

impl MaxLen {
    pub const DEFAULT: usize = 8;
    pub const MIN: usize = 2;
    pub const MAX: usize = 15;

    /// Clamp an arbitrary length into `[MIN, MAX]`
    pub fn clamped(len: i64) -> Self {
        Self(len.clamp(Self::MIN as i64, Self::MAX as i64) as usize)
    }

    /// Interpret the `maxLen` field of a request body.
    ///
    /// Never fails: absent, non-numeric, non-finite and zero values fall back
    /// to the default, numeric strings are accepted, fractions are truncated,
    /// and the result is clamped.
    pub fn from_request(raw: Option<&Value>) -> Self {
        let parsed = match raw {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() && v != 0.0 => Self::clamped(v.trunc() as i64),
            _ => Self(Self::DEFAULT),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for MaxLen {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Outcome of a completed search
#[derive(Debug, Clone, Default)]
pub struct CycleSearch {
    /// Distinct cycles in discovery order, each starting at the node it was found from
    pub cycles: Vec<Vec<NodeId>>,

    /// DFS node expansions performed
    pub expansions: u64,
}

/// Request-scoped DFS state.
///
/// Start nodes are visited in ascending id order. A successor equal to the
/// start closes a cycle once the path holds at least two nodes; otherwise the
/// search descends into successors that are off-path, have outgoing edges,
/// and fit under the length cap.
pub struct CycleFinder<'a> {
    graph: &'a Adjacency,
    max_len: usize,
    budget: Option<u64>,
    expansions: u64,
    path: Vec<&'a str>,
    on_path: HashSet<&'a str>,
    dedup: Deduplicator,
    cycles: Vec<Vec<NodeId>>,
}

impl<'a> CycleFinder<'a> {
    pub fn new(graph: &'a Adjacency, max_len: MaxLen) -> Self {
        Self {
            graph,
            max_len: max_len.get(),
            budget: None,
            expansions: 0,
            path: Vec::with_capacity(max_len.get()),
            on_path: HashSet::new(),
            dedup: Deduplicator::new(),
            cycles: Vec::new(),
        }
    }

    /// Abort with an error once more than `budget` nodes have been expanded
    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.budget = budget;
        self
    }

    pub fn run(mut self) -> Result<CycleSearch> {
        let graph = self.graph;
        for start in graph.nodes() {
            self.visit(start, start)?;
        }

        Ok(CycleSearch {
            cycles: self.cycles,
            expansions: self.expansions,
        })
    }

    fn visit(&mut self, start: &'a str, node: &'a str) -> Result<()> {
        if self.path.len() >= self.max_len {
            return Ok(());
        }

        self.expansions += 1;
        if let Some(budget) = self.budget {
            if self.expansions > budget {
                return Err(AppError::ChainSearchBudgetExceeded { budget });
            }
        }

        self.path.push(node);
        self.on_path.insert(node);

        let graph = self.graph;
        for next in graph.successors(node) {
            let next = next.as_str();
            if next == start && self.path.len() >= 2 {
                self.record();
            } else if !self.on_path.contains(next)
                && graph.has_successors(next)
                && self.path.len() < self.max_len
            {
                self.visit(start, next)?;
            }
        }

        self.path.pop();
        self.on_path.remove(node);
        Ok(())
    }

    fn record(&mut self) {
        let cycle: Vec<NodeId> = self.path.iter().map(|s| s.to_string()).collect();
        if self.dedup.admit(&cycle) {
            self.cycles.push(cycle);
        }
    }
}
