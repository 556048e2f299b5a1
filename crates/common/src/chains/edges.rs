//! Edge extraction from pending applications

use serde::{Deserialize, Serialize};

/// Opaque user identifier, the canonical text form of the user's UUID
pub type NodeId = String;

/// Priority assumed for an application that carries none
pub const MISSING_PRIORITY: i32 = 999;

/// One pending application joined with its position's occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApplication {
    /// Applying user, absent for orphaned rows
    pub applicant: Option<NodeId>,

    /// Target position
    pub position: String,

    /// Current occupant of the position, absent when vacant
    pub occupant: Option<NodeId>,

    /// Applicant's preference for this position (1 = most wanted)
    pub priority: Option<i32>,
}

/// Directed `applicant -> occupant` relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub priority: i32,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, priority: i32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            priority,
        }
    }
}

/// Turn application rows into edges, dropping rows without an applicant
/// or whose position is vacant. Input order is preserved.
pub fn extract_edges<I>(applications: I) -> Vec<Edge>
where
    I: IntoIterator<Item = PendingApplication>,
{
    applications
        .into_iter()
        .filter_map(|app| match (app.applicant, app.occupant) {
            (Some(source), Some(target)) => Some(Edge {
                source,
                target,
                priority: app.priority.unwrap_or(MISSING_PRIORITY),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(applicant: Option<&str>, occupant: Option<&str>, priority: Option<i32>) -> PendingApplication {
        PendingApplication {
            applicant: applicant.map(str::to_string),
            position: "pos".to_string(),
            occupant: occupant.map(str::to_string),
            priority,
        }
    }

    #[test]
    fn test_vacant_and_orphaned_rows_are_dropped() {
        let edges = extract_edges(vec![
            app(Some("u1"), Some("u2"), Some(1)),
            app(Some("u1"), None, Some(2)),
            app(None, Some("u2"), Some(3)),
            app(Some("u2"), Some("u1"), Some(4)),
        ]);

        assert_eq!(edges, vec![Edge::new("u1", "u2", 1), Edge::new("u2", "u1", 4)]);
    }

    #[test]
    fn test_missing_priority_uses_sentinel() {
        let edges = extract_edges(vec![app(Some("a"), Some("b"), None)]);
        assert_eq!(edges[0].priority, MISSING_PRIORITY);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_edges(Vec::new()).is_empty());
    }
}
