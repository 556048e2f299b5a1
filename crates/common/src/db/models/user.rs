//! User entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Availability of a user for rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Inactive,
    Active,
    Available,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Inactive => "inactive",
            AvailabilityStatus::Active => "active",
            AvailabilityStatus::Available => "available",
        }
    }
}

impl From<&str> for AvailabilityStatus {
    /// Case-insensitive; anything unknown counts as inactive
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => AvailabilityStatus::Active,
            "available" => AvailabilityStatus::Available,
            _ => AvailabilityStatus::Inactive,
        }
    }
}

impl From<AvailabilityStatus> for String {
    fn from(status: AvailabilityStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_name: Option<String>,

    pub location_id: Option<Uuid>,

    pub role_id: Option<Uuid>,

    pub position_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub availability_status: Option<String>,

    pub application_count: Option<i32>,

    pub show_position: Option<bool>,

    pub fixed_location: Option<bool>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,
}

impl Model {
    pub fn status(&self) -> AvailabilityStatus {
        self.availability_status
            .as_deref()
            .map(AvailabilityStatus::from)
            .unwrap_or(AvailabilityStatus::Inactive)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,

    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(AvailabilityStatus::from("Available"), AvailabilityStatus::Available);
        assert_eq!(AvailabilityStatus::from("active"), AvailabilityStatus::Active);
        assert_eq!(AvailabilityStatus::from("retired"), AvailabilityStatus::Inactive);
        assert_eq!(String::from(AvailabilityStatus::Available), "available");
    }
}
