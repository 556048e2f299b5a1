//! Correlation IDs
//!
//! Every request carries one: taken from the configured header when the
//! client sends it, otherwise a fresh UUID. It is echoed on the response and
//! written to the audit log.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderName};
use std::convert::Infallible;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Correlation ID of the current request, if one could be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub Option<String>);

impl CorrelationId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .map(str::to_string);

        Ok(CorrelationId(id))
    }
}

/// Layers that assign and echo the correlation header
pub fn layers(header: HeaderName) -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(header.clone(), MakeRequestUuid),
        PropagateRequestIdLayer::new(header),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let (set_id, propagate_id) = layers(HeaderName::from_static("x-correlation-id"));
        Router::new()
            .route(
                "/echo",
                get(|id: CorrelationId| async move { id.0.unwrap_or_default() }),
            )
            .layer(propagate_id)
            .layer(set_id)
    }

    #[tokio::test]
    async fn test_incoming_id_is_reused() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header("x-correlation-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-correlation-id"], "abc-123");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"abc-123");
    }

    #[tokio::test]
    async fn test_missing_id_is_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers()["x-correlation-id"].to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&header).is_ok());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, header.as_bytes());
    }
}
