//! HTTP routes for the recipe service
//!
//! This module defines all HTTP endpoints exposed by the service.

pub mod health;
pub mod metrics;
pub mod recipes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    middleware::rate_limiter::{rate_limit_middleware, RateLimitGuard},
    AppState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trust_proxy = state.config.trust_proxy_headers;
    let read_guard =
        RateLimitGuard::new(state.rate_limiter.clone(), None, None).trust_proxy_headers(trust_proxy);
    let write_guard = RateLimitGuard::new(
        state.rate_limiter.clone(),
        Some(state.config.rate_limit_write_max_requests),
        None,
    )
    .trust_proxy_headers(trust_proxy);

    // route_layer runs after routing, so the guard sees the matched route
    let read_routes = Router::new()
        .route("/recipes/:id", get(recipes::get_recipe))
        .route_layer(middleware::from_fn_with_state(
            read_guard,
            rate_limit_middleware,
        ));

    let write_routes = Router::new()
        .route("/recipes", post(recipes::create_recipe))
        .route(
            "/recipes/:id",
            axum::routing::put(recipes::update_recipe).delete(recipes::delete_recipe),
        )
        .route_layer(middleware::from_fn_with_state(
            write_guard,
            rate_limit_middleware,
        ));

    // Public routes (health checks, metrics) - not rate limited
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(read_routes)
        .merge(write_routes)
        // Global middleware (applied to all routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
