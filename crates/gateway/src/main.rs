//! Chairs API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and admin authorization
//! - Rate limiting of the admin surface
//! - Request routing
//! - Observability (logging, metrics, correlation IDs)

mod handlers;
mod middleware;

use axum::{
    extract::FromRef,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get, post},
    Router,
};
use chairs_common::{
    auth::JwtVerifier,
    config::AppConfig,
    db::DbPool,
    metrics::{self, CHAIN_SEARCH_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    GraphEngineClient,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use middleware::rate_limit::AdminRateLimiter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtVerifier>,
    pub graph_engine: Arc<GraphEngineClient>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config);

    info!("Starting Chairs API Gateway v{}", chairs_common::VERSION);

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    let config = Arc::new(config);

    // Initialize metrics
    init_metrics(&config)?;

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;

    let state = AppState {
        jwt: Arc::new(JwtVerifier::new(
            &config.auth.jwt_secret,
            &config.auth.jwt_audience,
        )),
        graph_engine: Arc::new(GraphEngineClient::new(&config.graph_engine)?),
        config: config.clone(),
        db,
    };

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Prometheus scrape endpoint on its own port; port 0 disables it
fn init_metrics(config: &AppConfig) -> anyhow::Result<()> {
    let port = config.observability.metrics_port;
    if port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
                LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_chain_search_duration_seconds", METRICS_PREFIX)),
                CHAIN_SEARCH_BUCKETS,
            )?
            .install()?;
        info!(port, "Prometheus exporter listening");
    }

    metrics::register_metrics();
    Ok(())
}

/// Browser origins from config; requests without `Origin` are unaffected
fn cors_layer(config: &AppConfig, correlation_header: &HeaderName) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) if origin != "*" => Some(value),
            _ => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            correlation_header.clone(),
        ])
        .expose_headers([correlation_header.clone()])
}

/// Admin routes: rate limited, then authenticated and checked against `app_admins`
fn admin_router(state: &AppState) -> Router<AppState> {
    let limiter = if state.config.rate_limit.enabled {
        AdminRateLimiter::per_minute(state.config.rate_limit.admin_requests_per_minute)
    } else {
        AdminRateLimiter::disabled()
    };

    Router::new()
        .route(
            "/test-scenarios/{scenario_id}/initialize",
            post(handlers::admin::initialize_scenario),
        )
        .route("/users/reset-active", post(handlers::admin::reset_active))
        .route("/users/{user_id}/deactivate", post(handlers::admin::deactivate_user))
        .route("/sync-graph", post(handlers::sync_graph::sync_graph))
        .route("/graph/chains", post(handlers::chains::compute))
        .route("/graph", any(handlers::graph_proxy::forward_root))
        .route("/graph/{*rest}", any(handlers::graph_proxy::forward))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::admin::require_admin,
        ))
        .route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ))
}

/// Create the main application router
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let correlation_header =
        HeaderName::try_from(state.config.auth.correlation_header.to_ascii_lowercase())?;
    let (set_correlation_id, propagate_correlation_id) =
        middleware::correlation::layers(correlation_header.clone());
    let cors = cors_layer(&state.config, &correlation_header);

    let api_routes = Router::new()
        .route("/_debug/ping", get(handlers::health::ping))
        .route("/public/locations", get(handlers::public::locations))
        .route("/users/me", get(handlers::users::me))
        .route("/users/me/ensure", post(handlers::users::ensure_profile))
        .route("/users/me/applications", get(handlers::users::my_applications))
        .route("/users/me/deactivate", post(handlers::users::deactivate_self))
        .route("/users/me/activate", post(handlers::users::activate_self))
        .route(
            "/users/{user_id}/applications/bulk",
            post(handlers::applications::bulk_insert).delete(handlers::applications::bulk_delete),
        )
        .route("/map/positions", get(handlers::map::positions))
        .nest("/admin", admin_router(&state));

    // Compose the app
    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_correlation_id)
        .layer(set_correlation_id)
        .with_state(state);

    Ok(app)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
