//! Rotation-invariant cycle identity

use super::edges::NodeId;
use std::collections::HashSet;

/// Joins node ids inside a canonical key
pub const KEY_SEPARATOR: &str = "->";

/// Rotate the cycle to start at its smallest id and join with `->`.
///
/// Direction is preserved, so a cycle and its reverse get different keys.
pub fn canonical_key(cycle: &[NodeId]) -> String {
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    cycle[pivot..]
        .iter()
        .chain(cycle[..pivot].iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Seen-set of canonical keys for one computation
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a cycle (or any rotation of it) is offered
    pub fn admit(&mut self, cycle: &[NodeId]) -> bool {
        self.seen.insert(canonical_key(cycle))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
