//! Repository pattern for database operations
//!
//! Provides one place for every query the service runs. Simple reads and
//! writes go through the entities; joins, upserts and bulk copies use raw
//! statements. Multi-statement mutations run inside a transaction on the
//! primary connection.

use crate::chains::{ChainSource, NodeId, PendingApplication};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Public location entry
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
}

/// Profile fields exposed to the owning user
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub location_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub availability_status: Option<String>,
    pub application_count: Option<i32>,
    pub fixed_location: Option<bool>,
}

/// One of the caller's applications joined with the occupant's details
#[derive(Debug, Clone, FromQueryResult)]
pub struct OwnApplicationRow {
    pub app_id: Uuid,
    pub position_id: Uuid,
    pub priority: Option<i32>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub occupied_by: Option<Uuid>,
    pub occ_user_id: Option<Uuid>,
    pub occ_full_name: Option<String>,
    pub occ_fixed_location: Option<bool>,
    pub occ_role_name: Option<String>,
    pub occ_location_name: Option<String>,
}

/// Result of a self-service status change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfStatus {
    pub user_id: Uuid,
    pub status: String,
    pub show_position: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub inserted_applications: u64,
    pub activated_users: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub applications_deleted: u64,
    pub users_updated: u64,
}

/// Application row resolved to the occupant it points at, for graph sync
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct ApplicationLink {
    pub user_id: Option<String>,
    pub target_user_id: Option<String>,
    pub priority: Option<i32>,
}

/// Status and coordinates of the map viewer
#[derive(Debug, Clone, FromQueryResult)]
pub struct ViewerRow {
    pub id: Uuid,
    pub availability_status: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A user related to the map viewer through one application
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RelatedLink {
    pub position_id: Uuid,
    pub related_user_id: Option<Uuid>,
    pub priority: Option<i32>,
}

/// User placed on the map through the position they hold
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct MapUserRow {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub availability_status: Option<String>,
    pub position_id: Uuid,
    pub role_name: Option<String>,
    pub location_id: Uuid,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct PendingRow {
    applicant: Option<String>,
    position: String,
    occupant: Option<String>,
    priority: Option<i32>,
}

#[derive(Debug, FromQueryResult)]
struct StatusRow {
    availability_status: Option<String>,
    show_position: Option<bool>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    fn stmt(sql: &str, values: Vec<sea_orm::Value>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    // ========================================================================
    // Health & RBAC
    // ========================================================================

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Whether the user is on the administrator allowlist
    pub async fn is_admin(&self, user_id: Uuid) -> Result<bool> {
        let row = AppAdminEntity::find_by_id(user_id)
            .one(self.read_conn())
            .await?;
        Ok(row.is_some())
    }

    // ========================================================================
    // Graph Reads
    // ========================================================================

    /// Every application paired with the occupant of its position, vacant
    /// positions included (the occupant is then `None`)
    pub async fn application_links(&self) -> Result<Vec<ApplicationLink>> {
        let stmt = Self::stmt(
            r#"
            SELECT
                a.user_id::text AS user_id,
                p.occupied_by::text AS target_user_id,
                a.priority
            FROM applications a
            LEFT JOIN positions p ON p.id = a.position_id
            "#,
            vec![],
        );

        ApplicationLink::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Admin Mutations
    // ========================================================================

    /// Replace all applications with the scenario's and activate its users
    pub async fn initialize_scenario(&self, scenario_id: Uuid) -> Result<ScenarioSummary> {
        let txn = self.write_conn().begin().await?;

        UserEntity::update_many()
            .col_expr(UserColumn::AvailabilityStatus, Expr::value(AvailabilityStatus::Inactive.as_str()))
            .col_expr(UserColumn::ApplicationCount, Expr::value(0))
            .exec(&txn)
            .await?;

        ApplicationEntity::delete_many().exec(&txn).await?;

        let inserted = txn
            .execute(Self::stmt(
                r#"
                INSERT INTO applications (user_id, position_id, priority)
                SELECT user_id, position_id, priority
                FROM test_scenario_applications
                WHERE test_scenario_id = $1
                "#,
                vec![scenario_id.into()],
            ))
            .await?
            .rows_affected();

        let activated = txn
            .execute(Self::stmt(
                r#"
                UPDATE users
                SET availability_status = 'active'
                WHERE id IN (
                    SELECT DISTINCT user_id
                    FROM test_scenario_applications
                    WHERE test_scenario_id = $1
                )
                "#,
                vec![scenario_id.into()],
            ))
            .await?
            .rows_affected();

        txn.commit().await?;

        Ok(ScenarioSummary {
            inserted_applications: inserted,
            activated_users: activated,
        })
    }

    /// Mark a user inactive and drop their applications
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        UserEntity::update_many()
            .col_expr(UserColumn::AvailabilityStatus, Expr::value(AvailabilityStatus::Inactive.as_str()))
            .filter(UserColumn::Id.eq(user_id))
            .exec(&txn)
            .await?;

        ApplicationEntity::delete_many()
            .filter(ApplicationColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Delete every application and reset users that are not already reset
    pub async fn reset_active(&self) -> Result<ResetSummary> {
        let txn = self.write_conn().begin().await?;

        let applications_deleted = ApplicationEntity::delete_many()
            .exec(&txn)
            .await?
            .rows_affected;

        let users_updated = txn
            .execute(Self::stmt(
                r#"
                UPDATE users
                SET availability_status = 'inactive',
                    application_count = 0
                WHERE availability_status IS DISTINCT FROM 'inactive'
                   OR application_count IS DISTINCT FROM 0
                "#,
                vec![],
            ))
            .await?
            .rows_affected();

        txn.commit().await?;

        Ok(ResetSummary {
            applications_deleted,
            users_updated,
        })
    }

    // ========================================================================
    // Profile Operations
    // ========================================================================

    /// Create the caller's profile row, or update name and location
    pub async fn ensure_profile(
        &self,
        user_id: Uuid,
        email: Option<String>,
        full_name: String,
        location_id: Option<Uuid>,
    ) -> Result<UserProfile> {
        let stmt = Self::stmt(
            r#"
            INSERT INTO users (id, email, full_name, location_id, availability_status, application_count)
            VALUES ($1, $2, $3, $4, 'inactive', 0)
            ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                location_id = EXCLUDED.location_id
            RETURNING id, email, full_name, location_id, role_id,
                      availability_status, application_count, fixed_location
            "#,
            vec![user_id.into(), email.into(), full_name.into(), location_id.into()],
        );

        UserProfile::find_by_statement(stmt)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "profile upsert returned no row".to_string(),
            })
    }

    pub async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let stmt = Self::stmt(
            r#"
            SELECT id, email, full_name, location_id, role_id,
                   availability_status, application_count, fixed_location
            FROM users
            WHERE id = $1
            LIMIT 1
            "#,
            vec![user_id.into()],
        );

        UserProfile::find_by_statement(stmt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The user's applications, most preferred first
    pub async fn applications_for_user(&self, user_id: Uuid) -> Result<Vec<OwnApplicationRow>> {
        let stmt = Self::stmt(
            r#"
            SELECT
                a.id AS app_id,
                a.position_id,
                a.priority,
                a.created_at,
                p.occupied_by,
                ou.id AS occ_user_id,
                ou.full_name AS occ_full_name,
                ou.fixed_location AS occ_fixed_location,
                r.name AS occ_role_name,
                l.name AS occ_location_name
            FROM applications a
            JOIN positions p ON p.id = a.position_id
            LEFT JOIN users ou ON ou.id = p.occupied_by
            LEFT JOIN roles r ON r.id = ou.role_id
            LEFT JOIN locations l ON l.id = ou.location_id
            WHERE a.user_id = $1
            ORDER BY a.priority ASC, a.created_at ASC
            "#,
            vec![user_id.into()],
        );

        OwnApplicationRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Withdraw from rotation: drop applications and hide the position
    pub async fn deactivate_self(&self, user_id: Uuid) -> Result<SelfStatus> {
        let txn = self.write_conn().begin().await?;

        ApplicationEntity::delete_many()
            .filter(ApplicationColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let row = StatusRow::find_by_statement(Self::stmt(
            r#"
            UPDATE users
            SET availability_status = 'inactive',
                show_position = false,
                application_count = 0
            WHERE id = $1
            RETURNING availability_status, show_position
            "#,
            vec![user_id.into()],
        ))
        .one(&txn)
        .await?;

        txn.commit().await?;

        Ok(self_status(user_id, row, AvailabilityStatus::Inactive, false))
    }

    /// Rejoin rotation
    pub async fn activate_self(&self, user_id: Uuid) -> Result<SelfStatus> {
        let row = StatusRow::find_by_statement(Self::stmt(
            r#"
            UPDATE users
            SET availability_status = 'available',
                show_position = true
            WHERE id = $1
            RETURNING availability_status, show_position
            "#,
            vec![user_id.into()],
        ))
        .one(self.write_conn())
        .await?;

        Ok(self_status(user_id, row, AvailabilityStatus::Available, true))
    }

    // ========================================================================
    // Application Operations
    // ========================================================================

    /// `app_config.max_applications`, if configured
    pub async fn max_applications(&self) -> Result<Option<i32>> {
        let value = AppConfigEntity::find()
            .select_only()
            .column(AppConfigColumn::MaxApplications)
            .into_tuple::<Option<i32>>()
            .one(self.read_conn())
            .await?;

        Ok(value.flatten())
    }

    pub async fn priority_in_use(&self, user_id: Uuid, priority: i32) -> Result<bool> {
        let count = ApplicationEntity::find()
            .filter(ApplicationColumn::UserId.eq(user_id))
            .filter(ApplicationColumn::Priority.eq(priority))
            .count(self.read_conn())
            .await?;

        Ok(count > 0)
    }

    /// Insert one application per position, all with the same priority
    pub async fn insert_applications(
        &self,
        user_id: Uuid,
        position_ids: &[Uuid],
        priority: i32,
    ) -> Result<u64> {
        if position_ids.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now();
        let rows = position_ids.iter().map(|position_id| ApplicationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(user_id)),
            position_id: Set(*position_id),
            priority: Set(Some(priority)),
            created_at: Set(Some(now.into())),
        });

        ApplicationEntity::insert_many(rows)
            .exec_without_returning(self.write_conn())
            .await
            .map_err(|e| AppError::InsertFailed { message: e.to_string() })
    }

    pub async fn delete_applications(&self, user_id: Uuid, position_ids: &[Uuid]) -> Result<u64> {
        let result = ApplicationEntity::delete_many()
            .filter(ApplicationColumn::UserId.eq(user_id))
            .filter(ApplicationColumn::PositionId.is_in(position_ids.iter().copied()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    // ========================================================================
    // Public & Map Reads
    // ========================================================================

    pub async fn list_locations(&self) -> Result<Vec<LocationSummary>> {
        LocationEntity::find()
            .select_only()
            .column(LocationColumn::Id)
            .column(LocationColumn::Name)
            .order_by_asc(LocationColumn::Name)
            .limit(2000)
            .into_model::<LocationSummary>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_viewer(&self, user_id: Uuid) -> Result<Option<ViewerRow>> {
        UserEntity::find_by_id(user_id)
            .select_only()
            .column(UserColumn::Id)
            .column(UserColumn::AvailabilityStatus)
            .column(UserColumn::Latitude)
            .column(UserColumn::Longitude)
            .into_model::<ViewerRow>()
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Priorities the user has already assigned, duplicates removed, ascending
    pub async fn used_priorities(&self, user_id: Uuid) -> Result<Vec<i32>> {
        let mut priorities: Vec<i32> = ApplicationEntity::find()
            .select_only()
            .column(ApplicationColumn::Priority)
            .filter(ApplicationColumn::UserId.eq(user_id))
            .into_tuple::<Option<i32>>()
            .all(self.read_conn())
            .await?
            .into_iter()
            .flatten()
            .collect();

        priorities.sort_unstable();
        priorities.dedup();
        Ok(priorities)
    }

    /// Occupants of the positions the user applied to
    pub async fn outgoing_links(&self, user_id: Uuid) -> Result<Vec<RelatedLink>> {
        let stmt = Self::stmt(
            r#"
            SELECT p.id AS position_id, p.occupied_by AS related_user_id, a.priority
            FROM applications a
            JOIN positions p ON p.id = a.position_id
            WHERE a.user_id = $1
            "#,
            vec![user_id.into()],
        );

        RelatedLink::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Applicants for the positions the user occupies
    pub async fn incoming_links(&self, user_id: Uuid) -> Result<Vec<RelatedLink>> {
        let stmt = Self::stmt(
            r#"
            SELECT p.id AS position_id, a.user_id AS related_user_id, a.priority
            FROM applications a
            JOIN positions p ON p.id = a.position_id
            WHERE p.occupied_by = $1
            "#,
            vec![user_id.into()],
        );

        RelatedLink::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Users holding a position at a known location
    pub async fn map_users(&self) -> Result<Vec<MapUserRow>> {
        let stmt = Self::stmt(
            r#"
            SELECT
                u.id AS user_id,
                u.full_name,
                u.availability_status,
                p.id AS position_id,
                p.role_name,
                l.id AS location_id,
                l.name AS location_name,
                l.latitude,
                l.longitude
            FROM users u
            JOIN positions p ON p.id = u.position_id
            JOIN locations l ON l.id = p.location_id
            ORDER BY l.name ASC, p.role_name ASC, u.full_name ASC
            "#,
            vec![],
        );

        MapUserRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub async fn insert_audit_entry(
        &self,
        admin_user_id: Uuid,
        action: &str,
        payload: serde_json::Value,
        result: serde_json::Value,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        let stmt = Self::stmt(
            r#"
            INSERT INTO admin_audit_log (ts, admin_user_id, action, payload_json, result_json, correlation_id)
            VALUES (NOW(), $1, $2, $3::jsonb, $4::jsonb, $5)
            "#,
            vec![
                admin_user_id.into(),
                action.into(),
                payload.into(),
                result.into(),
                correlation_id.map(str::to_string).into(),
            ],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }
}

fn self_status(
    user_id: Uuid,
    row: Option<StatusRow>,
    fallback: AvailabilityStatus,
    fallback_show: bool,
) -> SelfStatus {
    let (status, show) = row
        .map(|r| (r.availability_status, r.show_position))
        .unwrap_or((None, None));

    SelfStatus {
        user_id,
        status: status.unwrap_or_else(|| fallback.into()),
        show_position: show.unwrap_or(fallback_show),
    }
}

#[async_trait]
impl ChainSource for Repository {
    async fn fetch_pending_applications(&self) -> Result<Vec<PendingApplication>> {
        let stmt = Self::stmt(
            r#"
            SELECT
                a.user_id::text AS applicant,
                a.position_id::text AS position,
                p.occupied_by::text AS occupant,
                a.priority
            FROM applications a
            JOIN positions p ON p.id = a.position_id
            WHERE p.occupied_by IS NOT NULL
              AND a.user_id IS NOT NULL
            ORDER BY a.user_id ASC, COALESCE(a.priority, 999) ASC, a.position_id ASC
            "#,
            vec![],
        );

        let rows = PendingRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await?;

        debug!(rows = rows.len(), "Loaded pending applications");

        Ok(rows
            .into_iter()
            .map(|r| PendingApplication {
                applicant: r.applicant,
                position: r.position,
                occupant: r.occupant,
                priority: r.priority,
            })
            .collect())
    }

    async fn fetch_display_names(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
        let uuids: Vec<Uuid> = ids.iter().filter_map(|id| Uuid::parse_str(id).ok()).collect();
        if uuids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = UserEntity::find()
            .select_only()
            .column(UserColumn::Id)
            .column(UserColumn::FullName)
            .filter(UserColumn::Id.is_in(uuids))
            .into_tuple::<(Uuid, Option<String>)>()
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, name)| {
                name.filter(|n| !n.trim().is_empty())
                    .map(|n| (id.to_string(), n))
            })
            .collect())
    }
}
