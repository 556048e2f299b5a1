//! Client for the external graph engine
//!
//! The engine stores and renders the applicant graph. This service pushes a
//! full dataset to it on sync and proxies admin graph requests to it. Every
//! call carries the shared `x-graph-token` header.

use crate::config::GraphEngineConfig;
use crate::db::ApplicationLink;
use crate::errors::{AppError, Result};
use crate::metrics;
use axum::body::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared-secret header expected by the engine
pub const GRAPH_TOKEN_HEADER: &str = "x-graph-token";

const WARMUP_PATH: &str = "/neo4j/warmup";
const BUILD_GRAPH_PATH: &str = "/build-graph";

/// Metric label for every forwarded request, whatever its path
const PROXY_ENDPOINT: &str = "proxy";

/// Edge as the engine expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub user_id: String,
    pub target_user_id: String,
    pub priority: Option<i32>,
}

/// Payload of `POST /build-graph`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDataset {
    pub applications: Vec<GraphEdge>,
    pub users_by_id: BTreeMap<String, String>,
}

impl GraphDataset {
    /// Keep only links with both an applicant and an occupant
    pub fn from_links(links: Vec<ApplicationLink>) -> Self {
        let applications = links
            .into_iter()
            .filter_map(|link| match (link.user_id, link.target_user_id) {
                (Some(user_id), Some(target_user_id)) => Some(GraphEdge {
                    user_id,
                    target_user_id,
                    priority: link.priority,
                }),
                _ => None,
            })
            .collect();

        Self {
            applications,
            users_by_id: BTreeMap::new(),
        }
    }

    /// Every user on either end of an edge, ascending
    pub fn user_ids(&self) -> Vec<String> {
        self.applications
            .iter()
            .flat_map(|e| [e.user_id.clone(), e.target_user_id.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Label the users the directory resolved; unknown endpoints stay unlabelled
    pub fn with_names(mut self, names: &HashMap<String, String>) -> Self {
        self.users_by_id = self
            .user_ids()
            .into_iter()
            .filter_map(|id| names.get(&id).map(|name| (id, name.clone())))
            .collect();
        self
    }
}

/// Request forwarded verbatim to the engine
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path below the proxy mount, e.g. `/summary`
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Bytes,
}

/// Engine response relayed to the caller
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Map a proxied path onto the engine's routes; `/warmup` is served as `/health`
pub fn engine_path(rest: &str) -> String {
    let path = if rest.is_empty() {
        "/".to_string()
    } else if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };

    if path == "/warmup" {
        "/health".to_string()
    } else {
        path
    }
}

/// Second attempt after a 404, under `/api`
pub fn api_fallback(path: &str) -> Option<String> {
    (!path.starts_with("/api/")).then(|| format!("/api{}", path))
}

/// Bounded status vocabulary for metric labels
fn outcome_label(outcome: &reqwest::Result<reqwest::Response>) -> &'static str {
    match outcome {
        Ok(resp) if resp.status().is_success() => "ok",
        Ok(_) => "error",
        Err(_) => "unreachable",
    }
}

/// HTTP client for the graph engine
pub struct GraphEngineClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GraphEngineClient {
    pub fn new(config: &GraphEngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Wake the engine's database; failures are only logged
    pub async fn warmup(&self) {
        let started = Instant::now();
        let outcome = self
            .client
            .post(self.url(WARMUP_PATH, None))
            .header(GRAPH_TOKEN_HEADER, &self.token)
            .send()
            .await;

        metrics::record_graph_engine_call(
            WARMUP_PATH,
            outcome_label(&outcome),
            started.elapsed().as_secs_f64(),
        );

        match outcome {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = resp.status().as_u16(), "Graph engine warmup rejected");
            }
            Err(e) => warn!(error = %e, "Graph engine warmup failed"),
            Ok(_) => debug!("Graph engine warm"),
        }
    }

    /// Push a full dataset; returns the engine's JSON reply
    pub async fn build_graph(&self, dataset: &GraphDataset) -> Result<Value> {
        let started = Instant::now();
        let response = self
            .client
            .post(self.url(BUILD_GRAPH_PATH, None))
            .header(GRAPH_TOKEN_HEADER, &self.token)
            .json(dataset)
            .send()
            .await
            .inspect_err(|_| {
                metrics::record_graph_engine_call(
                    BUILD_GRAPH_PATH,
                    "unreachable",
                    started.elapsed().as_secs_f64(),
                )
            })?;

        let status = response.status();
        let body = response.json::<Value>().await.ok();
        let label = if status.is_success() { "ok" } else { "error" };
        metrics::record_graph_engine_call(BUILD_GRAPH_PATH, label, started.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(AppError::GraphEngine {
                endpoint: BUILD_GRAPH_PATH.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.unwrap_or(Value::Null))
    }

    /// Forward a request, retrying once under `/api` when the engine answers 404
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let path = engine_path(&request.path);

        let mut response = self.send_forward(&request, &path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            if let Some(fallback) = api_fallback(&path) {
                debug!(path = %path, fallback = %fallback, "Retrying graph request under /api");
                response = self.send_forward(&request, &fallback).await?;
            }
        }

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| AppError::GraphProxy {
            message: e.to_string(),
        })?;

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }

    async fn send_forward(&self, request: &ProxyRequest, path: &str) -> Result<reqwest::Response> {
        let started = Instant::now();
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(path, request.query.as_deref()))
            .header(GRAPH_TOKEN_HEADER, &self.token);

        if let Some(ct) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if request.method != Method::GET && request.method != Method::HEAD && !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let outcome = builder.send().await;
        if let Ok(resp) = &outcome {
            debug!(path = %path, status = resp.status().as_u16(), "Graph request forwarded");
        }
        metrics::record_graph_engine_call(
            PROXY_ENDPOINT,
            outcome_label(&outcome),
            started.elapsed().as_secs_f64(),
        );

        outcome.map_err(|e| AppError::GraphProxy {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::DebuggingRecorder;

    fn link(user: Option<&str>, target: Option<&str>, priority: Option<i32>) -> ApplicationLink {
        ApplicationLink {
            user_id: user.map(str::to_string),
            target_user_id: target.map(str::to_string),
            priority,
        }
    }

    #[test]
    fn test_engine_path_mapping() {
        assert_eq!(engine_path(""), "/");
        assert_eq!(engine_path("/warmup"), "/health");
        assert_eq!(engine_path("summary"), "/summary");
        assert_eq!(engine_path("/graph/summary"), "/graph/summary");
    }

    #[test]
    fn test_api_fallback() {
        assert_eq!(api_fallback("/summary").as_deref(), Some("/api/summary"));
        assert_eq!(api_fallback("/api/summary"), None);
    }

    #[test]
    fn test_dataset_drops_incomplete_links() {
        let dataset = GraphDataset::from_links(vec![
            link(Some("u1"), Some("u2"), Some(1)),
            link(Some("u1"), None, Some(2)),
            link(None, Some("u2"), None),
            link(Some("u2"), Some("u3"), None),
        ]);

        assert_eq!(dataset.applications.len(), 2);
        assert_eq!(dataset.user_ids(), vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_dataset_wire_format() {
        let names = HashMap::from([("u1".to_string(), "Ada".to_string())]);
        let dataset = GraphDataset::from_links(vec![link(Some("u1"), Some("u2"), Some(1))])
            .with_names(&names);

        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["applications"][0]["target_user_id"], "u2");
        assert_eq!(json["usersById"]["u1"], "Ada");
        assert!(json["usersById"].get("u2").is_none());
        assert_eq!(dataset.users_by_id.len(), 1);
    }

    #[test]
    fn test_proxy_metrics_use_fixed_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let client = GraphEngineClient::new(&GraphEngineConfig {
            url: "http://127.0.0.1:9".into(),
            token: "t".into(),
            timeout_secs: 1,
        })
        .unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                for i in 0..25 {
                    let request = ProxyRequest {
                        method: Method::GET,
                        path: format!("nodes/{}", i),
                        query: Some(format!("depth={}", i)),
                        content_type: None,
                        accept: None,
                        body: Bytes::new(),
                    };
                    assert!(client.forward(request).await.is_err());
                }
            })
        });

        let series = snapshotter.snapshot().into_vec();
        // One counter and one histogram, regardless of how many paths were hit
        assert_eq!(series.len(), 2);
        for (key, _, _, _) in &series {
            let labels: Vec<_> = key.key().labels().map(|l| (l.key(), l.value())).collect();
            assert!(labels.contains(&("endpoint", PROXY_ENDPOINT)));
            assert!(labels.iter().all(|(k, v)| *k != "status" || *v == "unreachable"));
        }
    }

    #[test]
    fn test_url_building() {
        let client = GraphEngineClient::new(&GraphEngineConfig {
            url: "http://graph:8000/".into(),
            token: "t".into(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(client.url("/health", None), "http://graph:8000/health");
        assert_eq!(client.url("/summary", Some("limit=5")), "http://graph:8000/summary?limit=5");
        assert_eq!(client.url("/summary", Some("")), "http://graph:8000/summary");
    }
}
