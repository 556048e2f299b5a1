//! Admin mutations: scenario seeding and user resets
//!
//! Every action is audited, including the ones that fail.

use super::parse_uuid;
use crate::middleware::correlation::CorrelationId;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chairs_common::{
    audit::{audit, AuditEntry},
    auth::AuthUser,
    errors::Result,
    Repository,
};
use serde_json::{json, Value};
use tracing::info;

/// Audit `outcome` under `entry`, then hand it back unchanged
async fn audited<T: serde::Serialize>(
    repo: &Repository,
    entry: AuditEntry,
    outcome: Result<T>,
) -> Result<T> {
    let entry = match &outcome {
        Ok(value) => entry.result(serde_json::to_value(value).unwrap_or(Value::Null)),
        Err(e) => entry.failed(e),
    };
    audit(repo, entry).await;
    outcome
}

/// Replace all live applications with a stored test scenario
pub async fn initialize_scenario(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
    Path(scenario_id): Path<String>,
) -> Result<Json<Value>> {
    let scenario_id = parse_uuid(&scenario_id, "scenarioId")?;
    let repo = Repository::new(state.db.clone());

    let outcome = repo.initialize_scenario(scenario_id).await;
    let entry = AuditEntry::new("scenario_initialize", user.id)
        .payload(json!({ "scenarioId": scenario_id }))
        .correlation_id(correlation_id.as_deref());
    let summary = audited(&repo, entry, outcome).await?;

    info!(
        scenario_id = %scenario_id,
        inserted = summary.inserted_applications,
        activated = summary.activated_users,
        "Scenario initialized"
    );

    Ok(Json(json!({
        "ok": true,
        "result": summary,
        "correlationId": correlation_id.0,
    })))
}

/// Take one user out of rotation
pub async fn deactivate_user(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let target = parse_uuid(&user_id, "userId")?;
    let repo = Repository::new(state.db.clone());

    let outcome = repo
        .deactivate_user(target)
        .await
        .map(|_| json!({ "userId": target, "status": "inactive" }));
    let entry = AuditEntry::new("user_deactivate", user.id)
        .payload(json!({ "userId": target }))
        .correlation_id(correlation_id.as_deref());
    let out = audited(&repo, entry, outcome).await?;

    Ok(Json(json!({ "ok": true, "out": out, "correlationId": correlation_id.0 })))
}

/// Clear every application and mark every user inactive
pub async fn reset_active(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<Value>> {
    let repo = Repository::new(state.db.clone());

    let outcome = repo.reset_active().await;
    let entry = AuditEntry::new("users_reset_active", user.id)
        .correlation_id(correlation_id.as_deref());
    let out = audited(&repo, entry, outcome).await?;

    info!(
        applications_deleted = out.applications_deleted,
        users_updated = out.users_updated,
        "Users reset"
    );

    Ok(Json(json!({ "ok": true, "out": out, "correlationId": correlation_id.0 })))
}
