//! Display-name resolution and response assembly

use super::edges::NodeId;
use super::scorer::ScoredChain;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A scored cycle ready for the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub length: usize,
    pub users: Vec<NodeId>,
    pub avg_priority: Option<f64>,
    pub people_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub edges: usize,
    pub nodes: usize,
    pub chains_found: usize,
    pub max_len: usize,
}

/// Complete result of one chain computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub summary: ChainSummary,
    pub chains: Vec<Chain>,
}

/// Every node appearing in any chain, ascending
pub fn involved_nodes(chains: &[ScoredChain]) -> Vec<NodeId> {
    chains
        .iter()
        .flat_map(|chain| chain.users.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Attach display names, falling back to the raw id
pub fn enrich(chains: Vec<ScoredChain>, names: &HashMap<NodeId, String>) -> Vec<Chain> {
    chains
        .into_iter()
        .map(|chain| {
            let people_names = chain
                .users
                .iter()
                .map(|id| names.get(id).cloned().unwrap_or_else(|| id.clone()))
                .collect();

            Chain {
                length: chain.length,
                users: chain.users,
                avg_priority: chain.avg_priority,
                people_names,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scored(users: &[&str], avg: f64) -> ScoredChain {
        ScoredChain {
            users: users.iter().map(|s| s.to_string()).collect(),
            length: users.len(),
            avg_priority: Some(avg),
        }
    }

    #[test]
    fn test_involved_nodes_sorted_unique() {
        let chains = vec![scored(&["c", "a"], 1.0), scored(&["a", "b"], 1.0)];
        assert_eq!(involved_nodes(&chains), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_name_falls_back_to_id() {
        let names = HashMap::from([("u1".to_string(), "Ada".to_string())]);
        let chains = enrich(vec![scored(&["u1", "u2"], 1.5)], &names);

        assert_eq!(chains[0].people_names, vec!["Ada", "u2"]);
        assert_eq!(chains[0].users, vec!["u1", "u2"]);
    }

    #[test]
    fn test_chain_wire_format() {
        let chains = enrich(vec![scored(&["u1", "u2"], 1.5)], &HashMap::new());
        let value = serde_json::to_value(&chains[0]).unwrap();

        assert_eq!(
            value,
            json!({
                "length": 2,
                "users": ["u1", "u2"],
                "avgPriority": 1.5,
                "peopleNames": ["u1", "u2"],
            })
        );

        let summary = ChainSummary { edges: 2, nodes: 2, chains_found: 1, max_len: 8 };
        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            json!({ "edges": 2, "nodes": 2, "chainsFound": 1, "maxLen": 8 })
        );
    }
}
