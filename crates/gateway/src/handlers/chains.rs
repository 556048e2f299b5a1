//! Rotation chain discovery endpoint

use crate::middleware::correlation::CorrelationId;
use crate::AppState;
use axum::{body::Bytes, extract::State, Json};
use chairs_common::{
    chains::{compute_chains, Chain, ChainSummary, MaxLen},
    errors::Result,
    Repository,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainsResponse {
    pub ok: bool,
    pub summary: ChainSummary,
    pub chains: Vec<Chain>,
    /// Same list as `chains`; no cycle cover is computed
    pub optimal_chains: Vec<Chain>,
    pub correlation_id: Option<String>,
}

/// `maxLen` from an optional, possibly malformed JSON body
pub(crate) fn requested_max_len(body: &[u8]) -> MaxLen {
    let parsed: Option<Value> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(body).ok()
    };

    MaxLen::from_request(parsed.as_ref().and_then(|v| v.get("maxLen")))
}

/// Find every rotation chain in the current application graph
pub async fn compute(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    body: Bytes,
) -> Result<Json<ChainsResponse>> {
    let max_len = requested_max_len(&body);
    let repo = Repository::new(state.db.clone());

    let report = compute_chains(&repo, max_len, state.config.chains.search_budget()).await?;

    Ok(Json(ChainsResponse {
        ok: true,
        summary: report.summary,
        optimal_chains: report.chains.clone(),
        chains: report.chains,
        correlation_id: correlation_id.0,
    }))
}
