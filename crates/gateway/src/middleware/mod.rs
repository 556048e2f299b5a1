//! Gateway middleware

pub mod admin;
pub mod correlation;
pub mod metrics;
pub mod rate_limit;
