//! Best-effort audit trail for administrative and self-service mutations
//!
//! A failed audit write is logged and counted, never surfaced to the caller.

use crate::db::Repository;
use crate::metrics;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

/// One row of `admin_audit_log`
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub actor: Uuid,
    pub payload: Value,
    pub result: Value,
    pub correlation_id: Option<String>,
}

impl AuditEntry {
    pub fn new(action: &'static str, actor: Uuid) -> Self {
        Self {
            action,
            actor,
            payload: json!({}),
            result: json!({}),
            correlation_id: None,
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    /// Record the failure message as the result
    pub fn failed(self, message: impl std::fmt::Display) -> Self {
        self.result(json!({ "error": message.to_string() }))
    }

    pub fn correlation_id(mut self, correlation_id: Option<&str>) -> Self {
        self.correlation_id = correlation_id.map(str::to_string);
        self
    }
}

/// Write the entry; failures are logged, never returned
pub async fn audit(repo: &Repository, entry: AuditEntry) {
    let outcome = repo
        .insert_audit_entry(
            entry.actor,
            entry.action,
            entry.payload,
            entry.result,
            entry.correlation_id.as_deref(),
        )
        .await;

    if let Err(e) = outcome {
        metrics::record_audit_failure(entry.action);
        error!(
            action = entry.action,
            actor = %entry.actor,
            correlation_id = ?entry.correlation_id,
            error = %e,
            "AUDIT_FAILED"
        );
    }
}
