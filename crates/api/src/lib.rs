//! HTTP surface for the indexing bridge (spec §6): webhook intake, direct
//! indexing, hybrid search, content reads, crawl metrics and health.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

const DEFAULT_INDEX_RATE_LIMIT_PER_MINUTE: u64 = 1000;

pub fn build_state(
    pool: Arc<bridge_worker::ServicePool>,
    webhook_router: Arc<bridge_webhook::WebhookRouter>,
    lifecycle: Arc<bridge_worker::LifecycleTracker>,
    config: Arc<bridge_common::BridgeConfig>,
) -> AppState {
    let api_secret = Arc::new(config.api_secret.clone());
    AppState {
        pool,
        webhook_router,
        lifecycle,
        config,
        api_secret,
        index_rate_limiter: Arc::new(rate_limit::RateLimiter::new(DEFAULT_INDEX_RATE_LIMIT_PER_MINUTE)),
    }
}

pub fn router(state: AppState) -> Router {
    let cors = build_cors(&state.config.cors_origins);

    let webhooks = Router::new()
        .route("/api/webhook/scraper", post(routes::webhook_scraper))
        .route("/api/webhook/change-detection", post(routes::webhook_change_detection));

    let protected = Router::new()
        .route("/api/index", post(routes::index_document))
        .route("/api/search", post(routes::search))
        .route("/api/content/by-url", get(routes::content_by_url))
        .route("/api/content/:id", get(routes::content_by_id))
        .route("/api/metrics/crawls/:job_id", get(routes::crawl_metrics))
        .route_layer(from_fn_with_state(state.clone(), auth::require_bearer_token));

    let public = Router::new().route("/health", get(routes::health));

    Router::new()
        .merge(webhooks)
        .merge(protected)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::logging::logging_middleware))
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST];
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_methods(methods).allow_origin(AllowOrigin::any());
    }
    let parsed: Vec<axum::http::HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new().allow_methods(methods).allow_origin(parsed)
}

/// Waits for the shutdown signal used by `axum::serve(...).with_graceful_shutdown`.
pub async fn shutdown_signal(mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    let _ = shutdown_rx.changed().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
}
