//! Positions map: who holds which role where, from one viewer's perspective
//!
//! `mode=from` marks roles whose holders the viewer applied to; `mode=to`
//! marks roles whose holders applied to the viewer's position.

use super::resolve_user;
use crate::middleware::admin::ensure_admin;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chairs_common::{
    auth::AuthUser,
    db::models::AvailabilityStatus,
    db::{MapUserRow, RelatedLink},
    errors::{AppError, Result},
    Repository,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Keeps the viewer's own pin from covering their location's pin
const ME_LOCATION_OFFSET: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    #[default]
    From,
    To,
}

impl MapMode {
    /// Anything other than `to` reads as `from`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("to") => MapMode::To,
            _ => MapMode::From,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapQuery {
    pub mode: Option<String>,
    pub viewer_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapUser {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub position_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleGroup {
    pub role_id: Uuid,
    pub role_name: Option<String>,
    pub applied: bool,
    pub priority: Option<i32>,
    pub users: Vec<MapUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    pub location_id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub roles: Vec<RoleGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapResponse {
    pub viewer_user_id: Uuid,
    pub my_status: &'static str,
    pub me_location: Option<Coordinates>,
    pub max_applications: Option<i32>,
    pub used_priorities: Vec<i32>,
    pub locations: Vec<LocationGroup>,
}

/// Group available users by location, then by position, in row order.
///
/// A role is `applied` when one of its holders appears in `links`; its
/// priority comes from the link recorded against that holder's position.
pub fn aggregate(users: Vec<MapUserRow>, links: &[RelatedLink]) -> Vec<LocationGroup> {
    let related: HashSet<Uuid> = links.iter().filter_map(|l| l.related_user_id).collect();
    let priorities: HashMap<Uuid, i32> = links
        .iter()
        .filter_map(|l| l.priority.map(|p| (l.position_id, p)))
        .collect();

    let mut locations: Vec<LocationGroup> = Vec::new();
    let mut location_index: HashMap<Uuid, usize> = HashMap::new();

    for user in users {
        if AvailabilityStatus::from(user.availability_status.as_deref().unwrap_or_default())
            != AvailabilityStatus::Available
        {
            continue;
        }

        let loc_idx = *location_index.entry(user.location_id).or_insert_with(|| {
            locations.push(LocationGroup {
                location_id: user.location_id,
                name: user.location_name.clone(),
                latitude: user.latitude,
                longitude: user.longitude,
                roles: Vec::new(),
            });
            locations.len() - 1
        });
        let location = &mut locations[loc_idx];

        let role_idx = match location.roles.iter().position(|r| r.role_id == user.position_id) {
            Some(idx) => idx,
            None => {
                location.roles.push(RoleGroup {
                    role_id: user.position_id,
                    role_name: user.role_name.clone(),
                    applied: false,
                    priority: None,
                    users: Vec::new(),
                });
                location.roles.len() - 1
            }
        };
        let role = &mut location.roles[role_idx];

        if related.contains(&user.user_id) {
            role.applied = true;
            if role.priority.is_none() {
                role.priority = priorities.get(&user.position_id).copied();
            }
        }

        role.users.push(MapUser {
            id: user.user_id,
            full_name: user.full_name,
            position_id: user.position_id,
        });
    }

    locations
}

pub async fn positions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MapQuery>,
) -> Result<Json<MapResponse>> {
    let repo = Repository::new(state.db.clone());

    let viewer_id = resolve_user(
        query.viewer_user_id.as_deref().unwrap_or_default(),
        user.id,
        "viewerUserId",
    )?;
    if viewer_id != user.id {
        ensure_admin(&repo, user.id).await?;
    }
    let mode = MapMode::parse(query.mode.as_deref());

    let max_applications = repo.max_applications().await?;
    let viewer = repo
        .find_viewer(viewer_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: viewer_id.to_string(),
        })?;
    let used_priorities = repo.used_priorities(viewer_id).await?;

    let links = match mode {
        MapMode::From => repo.outgoing_links(viewer_id).await?,
        MapMode::To => repo.incoming_links(viewer_id).await?,
    };
    let locations = aggregate(repo.map_users().await?, &links);

    let my_status = match AvailabilityStatus::from(viewer.availability_status.as_deref().unwrap_or_default()) {
        AvailabilityStatus::Available => "available",
        _ => "inactive",
    };
    let me_location = viewer
        .latitude
        .zip(viewer.longitude)
        .map(|(latitude, longitude)| Coordinates {
            latitude: latitude + ME_LOCATION_OFFSET,
            longitude: longitude + ME_LOCATION_OFFSET,
        });

    Ok(Json(MapResponse {
        viewer_user_id: viewer_id,
        my_status,
        me_location,
        max_applications,
        used_priorities,
        locations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(user: Uuid, position: Uuid, location: Uuid, status: &str) -> MapUserRow {
        MapUserRow {
            user_id: user,
            full_name: Some(format!("user-{}", &user.to_string()[..4])),
            availability_status: Some(status.to_string()),
            position_id: position,
            role_name: Some("Nurse".to_string()),
            location_id: location,
            location_name: "Torino".to_string(),
            latitude: Some(45.07),
            longitude: Some(7.68),
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(MapMode::parse(Some("to")), MapMode::To);
        assert_eq!(MapMode::parse(Some("from")), MapMode::From);
        assert_eq!(MapMode::parse(Some("sideways")), MapMode::From);
        assert_eq!(MapMode::parse(None), MapMode::From);
    }

    #[test]
    fn test_groups_by_location_and_role() {
        let (loc_a, loc_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (pos_1, pos_2) = (Uuid::new_v4(), Uuid::new_v4());
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let groups = aggregate(
            vec![
                holder(u1, pos_1, loc_a, "available"),
                holder(u2, pos_1, loc_a, "available"),
                holder(u3, pos_2, loc_b, "available"),
            ],
            &[],
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].location_id, loc_a);
        assert_eq!(groups[0].roles.len(), 1);
        assert_eq!(groups[0].roles[0].users.len(), 2);
        assert_eq!(groups[1].roles[0].users[0].id, u3);
        assert!(groups.iter().flat_map(|g| &g.roles).all(|r| !r.applied));
    }

    #[test]
    fn test_skips_unavailable_users() {
        let loc = Uuid::new_v4();
        let groups = aggregate(
            vec![
                holder(Uuid::new_v4(), Uuid::new_v4(), loc, "inactive"),
                holder(Uuid::new_v4(), Uuid::new_v4(), loc, "unknown"),
            ],
            &[],
        );

        assert!(groups.is_empty());
    }

    #[test]
    fn test_marks_related_holders() {
        let loc = Uuid::new_v4();
        let (pos_1, pos_2) = (Uuid::new_v4(), Uuid::new_v4());
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

        let links = vec![RelatedLink {
            position_id: pos_1,
            related_user_id: Some(u1),
            priority: Some(3),
        }];
        let groups = aggregate(
            vec![holder(u1, pos_1, loc, "available"), holder(u2, pos_2, loc, "available")],
            &links,
        );

        let roles = &groups[0].roles;
        assert!(roles[0].applied);
        assert_eq!(roles[0].priority, Some(3));
        assert!(!roles[1].applied);
        assert_eq!(roles[1].priority, None);
    }

    #[test]
    fn test_response_wire_format() {
        let response = MapResponse {
            viewer_user_id: Uuid::nil(),
            my_status: "inactive",
            me_location: None,
            max_applications: Some(5),
            used_priorities: vec![1, 2],
            locations: vec![],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["myStatus"], "inactive");
        assert_eq!(json["maxApplications"], 5);
        assert!(json["meLocation"].is_null());
        assert_eq!(json["usedPriorities"], serde_json::json!([1, 2]));
    }
}
