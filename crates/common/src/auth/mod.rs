//! Authentication utilities
//!
//! Provides:
//! - Bearer token parsing
//! - JWT validation for identity-provider access tokens
//! - The `AuthUser` extractor for handlers

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated caller, resolved once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Access-token claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Validates HS256 access tokens
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// `audience` empty disables the `aud` check
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }

    /// Resolve a token to the user it was issued for
    pub fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.validate_token(token)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        // Already resolved by the admin middleware
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_bearer(&parts.headers).ok_or_else(|| AppError::Unauthorized {
            message: "Missing Bearer token".to_string(),
        })?;

        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let user = verifier.authenticate(token)?;
        parts.extensions.insert(user.clone());

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(secret: &str, sub: &str, exp_offset: i64, aud: Option<&str>) -> String {
        let claims = JwtClaims {
            sub: sub.to_string(),
            email: Some("ada@example.com".to_string()),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            aud: aud.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let id = Uuid::new_v4();
        let verifier = JwtVerifier::new(SECRET, "authenticated");

        let user = verifier
            .authenticate(&token(SECRET, &id.to_string(), 3600, Some("authenticated")))
            .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_expired_token() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let expired = token(SECRET, &Uuid::new_v4().to_string(), -3600, Some("authenticated"));

        assert!(matches!(verifier.authenticate(&expired), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let forged = token("other", &Uuid::new_v4().to_string(), 3600, Some("authenticated"));

        assert!(matches!(verifier.authenticate(&forged), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_wrong_audience() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let other = token(SECRET, &Uuid::new_v4().to_string(), 3600, Some("service_role"));

        assert!(matches!(verifier.authenticate(&other), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_audience_check_disabled() {
        let verifier = JwtVerifier::new(SECRET, "");
        let no_aud = token(SECRET, &Uuid::new_v4().to_string(), 3600, None);

        assert!(verifier.authenticate(&no_aud).is_ok());
    }

    #[test]
    fn test_non_uuid_subject() {
        let verifier = JwtVerifier::new(SECRET, "");
        let bad = token(SECRET, "not-a-uuid", 3600, None);

        assert!(matches!(verifier.authenticate(&bad), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Some("abc.def"));
    }
}
