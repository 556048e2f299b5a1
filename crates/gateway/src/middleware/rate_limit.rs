//! Rate limiting middleware using token bucket algorithm
//!
//! One shared bucket guards the admin surface.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chairs_common::errors::AppError;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

const DEFAULT_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(60) {
    Some(n) => n,
    None => unreachable!(),
};

/// Limiter state handed to [`rate_limit_middleware`]
#[derive(Clone)]
pub struct AdminRateLimiter {
    limiter: Option<Arc<GlobalRateLimiter>>,
    per_minute: u32,
}

impl AdminRateLimiter {
    /// Full burst available up front, refilled evenly across the minute.
    /// A zero limit falls back to 60.
    pub fn per_minute(requests: u32) -> Self {
        let per_minute = NonZeroU32::new(requests).unwrap_or(DEFAULT_PER_MINUTE);

        Self {
            limiter: Some(Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))),
            per_minute: per_minute.get(),
        }
    }

    /// Limiter that lets everything through
    pub fn disabled() -> Self {
        Self {
            limiter: None,
            per_minute: 0,
        }
    }

    pub fn check(&self) -> Result<(), AppError> {
        match &self.limiter {
            Some(limiter) => limiter.check().map_err(|_| AppError::RateLimited {
                limit: self.per_minute,
            }),
            None => Ok(()),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<AdminRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = limiter.check() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = AdminRateLimiter::per_minute(100);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = AdminRateLimiter::per_minute(3);
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(matches!(limiter.check(), Err(AppError::RateLimited { limit: 3 })));
    }

    #[test]
    fn test_zero_falls_back_to_default() {
        let limiter = AdminRateLimiter::per_minute(0);
        assert_eq!(limiter.per_minute, 60);
    }

    #[test]
    fn test_disabled_never_rejects() {
        let limiter = AdminRateLimiter::disabled();
        for _ in 0..1000 {
            assert!(limiter.check().is_ok());
        }
    }

    #[tokio::test]
    async fn test_middleware_returns_429() {
        let app = Router::new().route("/", get(|| async { "ok" })).layer(
            axum::middleware::from_fn_with_state(
                AdminRateLimiter::per_minute(1),
                rate_limit_middleware,
            ),
        );

        let first = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
