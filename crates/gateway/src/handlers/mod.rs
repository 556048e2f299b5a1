//! API handlers module

pub mod admin;
pub mod applications;
pub mod chains;
pub mod graph_proxy;
pub mod health;
pub mod map;
pub mod public;
pub mod sync_graph;
pub mod users;

use chairs_common::errors::AppError;
use uuid::Uuid;
use validator::ValidationErrors;

/// Parse a UUID taken from the path, body or query
pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim()).map_err(|_| AppError::Validation {
        message: format!("{} must be a UUID", field),
        field: Some(field.to_string()),
    })
}

/// `me`, or a UUID naming another user
pub(crate) fn resolve_user(raw: &str, caller: Uuid, field: &str) -> Result<Uuid, AppError> {
    if raw.trim().is_empty() || raw == "me" {
        Ok(caller)
    } else {
        parse_uuid(raw, field)
    }
}

/// First failing field wins
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field_errors = errors.field_errors();
    let first = field_errors.iter().min_by_key(|(field, _)| field.to_string());

    match first {
        Some((field, errs)) => AppError::Validation {
            message: errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field)),
            field: Some(field.to_string()),
        },
        None => AppError::Validation {
            message: errors.to_string(),
            field: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user() {
        let caller = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(resolve_user("me", caller, "userId").unwrap(), caller);
        assert_eq!(resolve_user("", caller, "userId").unwrap(), caller);
        assert_eq!(resolve_user(&other.to_string(), caller, "userId").unwrap(), other);
    }

    #[test]
    fn test_parse_uuid_reports_field() {
        match parse_uuid("nope", "scenarioId") {
            Err(AppError::Validation { field, .. }) => assert_eq!(field.as_deref(), Some("scenarioId")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
