//! Self-service profile and rotation status

use super::{parse_uuid, validation_error};
use crate::middleware::correlation::CorrelationId;
use crate::AppState;
use axum::{extract::State, Json};
use chairs_common::{
    audit::{audit, AuditEntry},
    auth::AuthUser,
    db::{OwnApplicationRow, SelfStatus, UserProfile},
    errors::{AppError, Result},
    Repository,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Placeholder for a missing role or location name
const UNKNOWN_NAME: &str = "—";

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("full_name is required".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnsureProfileRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub full_name: String,

    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse<T> {
    pub ok: bool,
    pub user: T,
    pub correlation_id: Option<String>,
}

/// The subset of the profile returned by `GET /me`
#[derive(Debug, Serialize)]
pub struct MeView {
    pub id: Uuid,
    pub email: Option<String>,
    pub availability_status: Option<String>,
    pub location_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub fixed_location: Option<bool>,
}

impl From<UserProfile> for MeView {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            availability_status: p.availability_status,
            location_id: p.location_id,
            role_id: p.role_id,
            fixed_location: p.fixed_location,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OccupantView {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub fixed_location: Option<bool>,
    pub roles: NamedRef,
    pub locations: NamedRef,
}

#[derive(Debug, Serialize)]
pub struct PositionView {
    pub id: Uuid,
    pub occupied_by: Option<Uuid>,
    pub users: Option<OccupantView>,
}

/// One application, nested the way the web client reads it
#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub id: Uuid,
    pub position_id: Uuid,
    pub priority: Option<i32>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub positions: PositionView,
}

impl From<OwnApplicationRow> for ApplicationView {
    fn from(row: OwnApplicationRow) -> Self {
        let named = |name: Option<String>| NamedRef {
            name: name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        };

        let users = row.occ_user_id.map(|id| OccupantView {
            id,
            full_name: row.occ_full_name,
            fixed_location: row.occ_fixed_location,
            roles: named(row.occ_role_name),
            locations: named(row.occ_location_name),
        });

        Self {
            id: row.app_id,
            position_id: row.position_id,
            priority: row.priority,
            created_at: row.created_at,
            positions: PositionView {
                id: row.position_id,
                occupied_by: row.occupied_by,
                users,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationsResponse {
    pub ok: bool,
    pub applications: Vec<ApplicationView>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub out: SelfStatus,
    pub correlation_id: Option<String>,
}

/// Create or refresh the caller's profile after sign-in
pub async fn ensure_profile(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
    Json(request): Json<EnsureProfileRequest>,
) -> Result<Json<ProfileResponse<UserProfile>>> {
    request.validate().map_err(validation_error)?;

    let location_id = match request.location_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_uuid(raw, "location_id")?),
        _ => None,
    };

    let repo = Repository::new(state.db.clone());
    let profile = repo
        .ensure_profile(user.id, user.email, request.full_name.trim().to_string(), location_id)
        .await?;

    Ok(Json(ProfileResponse {
        ok: true,
        user: profile,
        correlation_id: correlation_id.0,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<ProfileResponse<MeView>>> {
    let repo = Repository::new(state.db.clone());
    let profile = repo
        .find_profile(user.id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: user.id.to_string(),
        })?;

    Ok(Json(ProfileResponse {
        ok: true,
        user: profile.into(),
        correlation_id: correlation_id.0,
    }))
}

/// The caller's applications, most preferred first
pub async fn my_applications(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<ApplicationsResponse>> {
    let repo = Repository::new(state.db.clone());
    let rows = repo.applications_for_user(user.id).await?;

    Ok(Json(ApplicationsResponse {
        ok: true,
        applications: rows.into_iter().map(ApplicationView::from).collect(),
        correlation_id: correlation_id.0,
    }))
}

async fn audited_status(
    repo: &Repository,
    action: &'static str,
    user: &AuthUser,
    correlation_id: &CorrelationId,
    outcome: Result<SelfStatus>,
) -> Result<SelfStatus> {
    let entry = AuditEntry::new(action, user.id).correlation_id(correlation_id.as_deref());
    let entry = match &outcome {
        Ok(status) => entry.result(json!(status)),
        Err(e) => entry.failed(e),
    };
    audit(repo, entry).await;
    outcome
}

/// Leave rotation: drops every application of the caller
pub async fn deactivate_self(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<StatusResponse>> {
    let repo = Repository::new(state.db.clone());
    let outcome = repo.deactivate_self(user.id).await;
    let out = audited_status(&repo, "user_deactivate_self", &user, &correlation_id, outcome).await?;

    Ok(Json(StatusResponse {
        ok: true,
        out,
        correlation_id: correlation_id.0,
    }))
}

pub async fn activate_self(
    State(state): State<AppState>,
    user: AuthUser,
    correlation_id: CorrelationId,
) -> Result<Json<StatusResponse>> {
    let repo = Repository::new(state.db.clone());
    let outcome = repo.activate_self(user.id).await;
    let out = audited_status(&repo, "user_activate_self", &user, &correlation_id, outcome).await?;

    Ok(Json(StatusResponse {
        ok: true,
        out,
        correlation_id: correlation_id.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(occupant: Option<Uuid>) -> OwnApplicationRow {
        OwnApplicationRow {
            app_id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            priority: Some(2),
            created_at: None,
            occupied_by: occupant,
            occ_user_id: occupant,
            occ_full_name: Some("Grace".into()),
            occ_fixed_location: Some(false),
            occ_role_name: None,
            occ_location_name: Some("Milano".into()),
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let request = EnsureProfileRequest {
            full_name: "   ".into(),
            location_id: None,
        };
        assert!(request.validate().is_err());

        let request = EnsureProfileRequest {
            full_name: " Ada ".into(),
            location_id: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_application_view_nesting() {
        let occupant = Uuid::new_v4();
        let view = ApplicationView::from(row(Some(occupant)));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["positions"]["id"], json["position_id"]);
        assert_eq!(json["positions"]["users"]["id"], occupant.to_string());
        assert_eq!(json["positions"]["users"]["roles"]["name"], UNKNOWN_NAME);
        assert_eq!(json["positions"]["users"]["locations"]["name"], "Milano");
    }

    #[test]
    fn test_vacant_position_has_no_occupant() {
        let view = ApplicationView::from(row(None));
        let json = serde_json::to_value(&view).unwrap();

        assert!(json["positions"]["users"].is_null());
        assert!(json["positions"]["occupied_by"].is_null());
    }
}
