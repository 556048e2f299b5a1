//! Bulk application writes
//!
//! A user may only write their own applications; admins may write anyone's.

use super::{parse_uuid, resolve_user};
use crate::middleware::admin::ensure_admin;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chairs_common::{
    auth::AuthUser,
    errors::{AppError, Result},
    Repository,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    #[serde(default)]
    pub position_ids: Option<Value>,
    #[serde(default)]
    pub priority: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub ok: bool,
    pub inserted: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: bool,
}

/// Distinct position ids in request order; must not come out empty
pub(crate) fn normalize_position_ids(raw: Option<&Value>) -> Result<Vec<Uuid>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for item in raw.and_then(Value::as_array).into_iter().flatten() {
        let text = match item {
            Value::String(s) => s.trim().to_string(),
            Value::Null => continue,
            other => other.to_string(),
        };
        if text.is_empty() || !seen.insert(text.clone()) {
            continue;
        }
        ids.push(parse_uuid(&text, "positionIds")?);
    }

    if ids.is_empty() {
        return Err(AppError::Validation {
            message: "positionIds must be a non-empty array".to_string(),
            field: Some("positionIds".to_string()),
        });
    }

    Ok(ids)
}

/// Priority as a whole number; numeric strings are accepted
pub(crate) fn parse_priority(raw: Option<&Value>) -> Result<i32> {
    let invalid = |message: &str| AppError::Validation {
        message: message.to_string(),
        field: Some("priority".to_string()),
    };

    let value = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .ok_or_else(|| invalid("priority must be a number"))?;

    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(invalid("priority must be an integer"));
    }

    Ok(value as i32)
}

/// `priority` must lie in `1..=max_applications`
pub(crate) fn check_priority_range(priority: i32, max_applications: Option<i32>) -> Result<()> {
    let max = match max_applications {
        Some(max) if max >= 1 => max,
        _ => {
            return Err(AppError::Configuration {
                message: "max_applications missing/invalid".to_string(),
            })
        }
    };

    if !(1..=max).contains(&priority) {
        return Err(AppError::InvalidPriority { max });
    }

    Ok(())
}

/// Resolve the target user, requiring admin rights to act for someone else
async fn target_user(repo: &Repository, raw: &str, caller: &AuthUser) -> Result<Uuid> {
    let target = resolve_user(raw, caller.id, "userId")?;
    if target != caller.id {
        ensure_admin(repo, caller.id).await?;
    }
    Ok(target)
}

/// Apply to several positions at one priority
pub async fn bulk_insert(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<InsertResponse>> {
    let repo = Repository::new(state.db.clone());
    let target = target_user(&repo, &user_id, &user).await?;

    let position_ids = normalize_position_ids(request.position_ids.as_ref())?;
    let priority = parse_priority(request.priority.as_ref())?;

    check_priority_range(priority, repo.max_applications().await?)?;

    if repo.priority_in_use(target, priority).await? {
        return Err(AppError::PriorityAlreadyUsed { priority });
    }

    let inserted = repo.insert_applications(target, &position_ids, priority).await?;
    info!(user_id = %target, priority, inserted, "Applications inserted");

    Ok(Json(InsertResponse { ok: true, inserted }))
}

/// Withdraw applications for the given positions
pub async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<DeleteResponse>> {
    let repo = Repository::new(state.db.clone());
    let target = target_user(&repo, &user_id, &user).await?;

    let position_ids = normalize_position_ids(request.position_ids.as_ref())?;
    let deleted = repo.delete_applications(target, &position_ids).await?;
    info!(user_id = %target, deleted, "Applications deleted");

    Ok(Json(DeleteResponse { ok: true, deleted: true }))
}
