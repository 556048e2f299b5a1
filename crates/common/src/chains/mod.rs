//! Rotation chain engine
//!
//! Finds every simple cycle in the `applicant -> occupant` graph built from
//! pending applications, deduplicates rotations, scores each cycle by the
//! priorities along it, and attaches display names.
//!
//! Stages run left to right: edge extraction, adjacency, cycle search with
//! canonical dedup, scoring, enrichment. Everything except the two
//! [`ChainSource`] reads is synchronous and request-local.

mod adjacency;
mod canonical;
mod edges;
mod enrich;
mod finder;
mod scorer;

pub use adjacency::Adjacency;
pub use canonical::{canonical_key, Deduplicator, KEY_SEPARATOR};
pub use edges::{extract_edges, Edge, NodeId, PendingApplication, MISSING_PRIORITY};
pub use enrich::{enrich, involved_nodes, Chain, ChainReport, ChainSummary};
pub use finder::{CycleFinder, CycleSearch, MaxLen};
pub use scorer::{score_cycles, PriorityTable, ScoredChain};

use crate::errors::Result;
use crate::metrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Read access the engine needs from the datastore
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Current pending applications joined with position occupancy
    async fn fetch_pending_applications(&self) -> Result<Vec<PendingApplication>>;

    /// Display names for the given users; unknown ids may be omitted
    async fn fetch_display_names(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>>;
}

/// Run the full pipeline against `source`.
///
/// Either returns every chain or fails; a datastore error or an exhausted
/// search budget never yields a partial list.
#[instrument(skip_all, fields(max_len = max_len.get(), budget = ?budget))]
pub async fn compute_chains<S>(source: &S, max_len: MaxLen, budget: Option<u64>) -> Result<ChainReport>
where
    S: ChainSource + ?Sized,
{
    let started = Instant::now();

    let applications = source.fetch_pending_applications().await?;
    let edges = extract_edges(applications);
    let graph = Adjacency::from_edges(&edges);
    debug!(edges = edges.len(), nodes = graph.node_count(), "Graph built");

    let search = match CycleFinder::new(&graph, max_len).with_budget(budget).run() {
        Ok(search) => search,
        Err(e) => {
            metrics::record_chain_search(started.elapsed().as_secs_f64(), 0, "budget_exceeded");
            return Err(e);
        }
    };

    let table = PriorityTable::from_edges(&edges);
    let scored = score_cycles(&table, search.cycles);

    let involved = involved_nodes(&scored);
    let names = if involved.is_empty() {
        HashMap::new()
    } else {
        source.fetch_display_names(&involved).await?
    };
    let chains = enrich(scored, &names);

    let summary = ChainSummary {
        edges: edges.len(),
        nodes: graph.node_count(),
        chains_found: chains.len(),
        max_len: max_len.get(),
    };

    metrics::record_chain_search(started.elapsed().as_secs_f64(), chains.len(), "ok");
    info!(
        edges = summary.edges,
        nodes = summary.nodes,
        chains = summary.chains_found,
        expansions = search.expansions,
        "Chain search complete"
    );

    Ok(ChainReport { summary, chains })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct MockSource {
        applications: Vec<PendingApplication>,
        names: HashMap<NodeId, String>,
        fail_applications: bool,
        name_lookups: AtomicUsize,
    }

    impl MockSource {
        fn with_edges(edges: &[(&str, &str, Option<i32>)]) -> Self {
            let applications = edges
                .iter()
                .enumerate()
                .map(|(i, (s, t, p))| PendingApplication {
                    applicant: Some(s.to_string()),
                    position: format!("pos-{}", i),
                    occupant: Some(t.to_string()),
                    priority: *p,
                })
                .collect();
            Self {
                applications,
                ..Default::default()
            }
        }

        fn named(mut self, id: &str, name: &str) -> Self {
            self.names.insert(id.to_string(), name.to_string());
            self
        }
    }

    #[async_trait]
    impl ChainSource for MockSource {
        async fn fetch_pending_applications(&self) -> Result<Vec<PendingApplication>> {
            if self.fail_applications {
                return Err(AppError::DatabaseConnection {
                    message: "connection refused".into(),
                });
            }
            Ok(self.applications.clone())
        }

        async fn fetch_display_names(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
            self.name_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(ids
                .iter()
                .filter_map(|id| self.names.get(id).map(|n| (id.clone(), n.clone())))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_two_cycle_scenario() {
        let source = MockSource::with_edges(&[("u1", "u2", Some(1)), ("u2", "u1", Some(2))])
            .named("u1", "Ada")
            .named("u2", "Grace");

        let report = assert_ok!(compute_chains(&source, MaxLen::default(), None).await);

        assert_eq!(
            report.summary,
            ChainSummary { edges: 2, nodes: 2, chains_found: 1, max_len: 8 }
        );
        let chain = &report.chains[0];
        assert_eq!(chain.length, 2);
        assert_eq!(chain.users, vec!["u1", "u2"]);
        assert_eq!(chain.avg_priority, Some(1.5));
        assert_eq!(chain.people_names, vec!["Ada", "Grace"]);
    }

    #[tokio::test]
    async fn test_no_cycle_skips_name_lookup() {
        let source = MockSource::with_edges(&[("u1", "u2", Some(1)), ("u2", "u3", Some(1))]);

        let report = assert_ok!(compute_chains(&source, MaxLen::default(), None).await);

        assert_eq!(report.summary.chains_found, 0);
        assert!(report.chains.is_empty());
        assert_eq!(report.summary.nodes, 2);
        assert_eq!(source.name_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_graph_is_valid() {
        let source = MockSource::default();
        let report = assert_ok!(compute_chains(&source, MaxLen::default(), None).await);

        assert_eq!(report.summary, ChainSummary { edges: 0, nodes: 0, chains_found: 0, max_len: 8 });
    }

    #[tokio::test]
    async fn test_disjoint_pairs_scored_independently() {
        let source = MockSource::with_edges(&[
            ("a", "b", Some(1)),
            ("b", "a", Some(1)),
            ("c", "d", Some(2)),
            ("d", "c", None),
        ]);

        let report = assert_ok!(compute_chains(&source, MaxLen::default(), None).await);

        assert_eq!(report.chains.len(), 2);
        assert_eq!(report.chains[0].avg_priority, Some(1.0));
        assert_eq!(report.chains[1].avg_priority, Some(500.5));
    }

    #[tokio::test]
    async fn test_clamped_max_len_is_reported() {
        let source = MockSource::with_edges(&[("a", "b", Some(1)), ("b", "a", Some(1))]);

        let low = assert_ok!(compute_chains(&source, MaxLen::clamped(1), None).await);
        assert_eq!(low.summary.max_len, 2);
        assert_eq!(low.chains.len(), 1);

        let high = assert_ok!(compute_chains(&source, MaxLen::clamped(9999), None).await);
        assert_eq!(high.summary.max_len, 15);
    }

    #[tokio::test]
    async fn test_rotation_independent_discovery() {
        for edges in [
            [("A", "B", Some(1)), ("B", "C", Some(1)), ("C", "A", Some(1))],
            [("C", "A", Some(1)), ("A", "B", Some(1)), ("B", "C", Some(1))],
            [("B", "C", Some(1)), ("C", "A", Some(1)), ("A", "B", Some(1))],
        ] {
            let source = MockSource::with_edges(&edges);
            let report = assert_ok!(compute_chains(&source, MaxLen::default(), None).await);

            assert_eq!(report.chains.len(), 1);
            assert_eq!(canonical_key(&report.chains[0].users), "A->B->C");
        }
    }

    #[tokio::test]
    async fn test_datastore_failure_propagates() {
        let source = MockSource {
            fail_applications: true,
            ..Default::default()
        };

        let err = assert_err!(compute_chains(&source, MaxLen::default(), None).await);
        assert!(matches!(err, AppError::DatabaseConnection { .. }));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_no_chains() {
        let source = MockSource::with_edges(&[
            ("a", "b", Some(1)),
            ("b", "c", Some(1)),
            ("c", "a", Some(1)),
            ("b", "a", Some(1)),
        ]);

        let err = assert_err!(compute_chains(&source, MaxLen::default(), Some(1)).await);
        assert!(matches!(err, AppError::ChainSearchBudgetExceeded { budget: 1 }));
    }
}
