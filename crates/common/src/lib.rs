//! Chairs Common Library
//!
//! Shared code for the Chairs backend including:
//! - Rotation chain engine (cycle discovery, dedup, scoring, enrichment)
//! - Database models and repository patterns
//! - Graph engine client
//! - Error types and handling
//! - Configuration management
//! - Authentication and audit utilities
//! - Metrics and observability

pub mod audit;
pub mod auth;
pub mod chains;
pub mod config;
pub mod db;
pub mod errors;
pub mod graph_engine;
pub mod metrics;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use graph_engine::GraphEngineClient;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
