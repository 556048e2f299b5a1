//! SeaORM entity models
//!
//! Tables of the rotation schema touched through the ORM. Join-heavy reads
//! go through raw statements in the repository instead.

mod app_admin;
mod app_config;
mod application;
mod location;
mod position;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    AvailabilityStatus,
};

pub use position::{
    Entity as PositionEntity,
    Model as Position,
    ActiveModel as PositionActiveModel,
    Column as PositionColumn,
};

pub use application::{
    Entity as ApplicationEntity,
    Model as Application,
    ActiveModel as ApplicationActiveModel,
    Column as ApplicationColumn,
};

pub use location::{
    Entity as LocationEntity,
    Model as Location,
    ActiveModel as LocationActiveModel,
    Column as LocationColumn,
};

pub use app_admin::{
    Entity as AppAdminEntity,
    Model as AppAdmin,
    Column as AppAdminColumn,
};

pub use app_config::{
    Entity as AppConfigEntity,
    Model as AppConfigRow,
    Column as AppConfigColumn,
};
