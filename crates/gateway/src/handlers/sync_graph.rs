//! Push the current application graph to the graph engine

use crate::middleware::correlation::CorrelationId;
use crate::AppState;
use axum::{extract::State, Json};
use chairs_common::{
    audit::{audit, AuditEntry},
    auth::AuthUser,
    chains::ChainSource,
    errors::Result,
    graph_engine::GraphDataset,
    Repository,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub applications_read: usize,
    pub edges_built: usize,
    pub users_mapped: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub ok: bool,
    pub correlation_id: Option<String>,
    pub dataset: DatasetStats,
    pub engine: Value,
}

/// Rebuild the engine's graph from every application with a known occupant
pub async fn sync_graph(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<SyncResponse>> {
    let repo = Repository::new(state.db.clone());

    let links = repo.application_links().await?;
    let applications_read = links.len();

    let dataset = GraphDataset::from_links(links);
    let names = repo.fetch_display_names(&dataset.user_ids()).await?;
    let dataset = dataset.with_names(&names);

    let unresolved = dataset.user_ids().len() - dataset.users_by_id.len();
    let stats = DatasetStats {
        applications_read,
        edges_built: dataset.applications.len(),
        users_mapped: dataset.users_by_id.len(),
    };

    state.graph_engine.warmup().await;
    let engine = state.graph_engine.build_graph(&dataset).await?;

    info!(
        applications_read = stats.applications_read,
        edges_built = stats.edges_built,
        users_mapped = stats.users_mapped,
        unresolved,
        "Graph synced"
    );

    audit(
        &repo,
        AuditEntry::new("graph_sync", user.id)
            .payload(json!({ "edges": stats.edges_built, "users": stats.users_mapped }))
            .result(engine.clone())
            .correlation_id(correlation_id.as_deref()),
    )
    .await;

    Ok(Json(SyncResponse {
        ok: true,
        correlation_id: correlation_id.0,
        dataset: stats,
        engine,
    }))
}
