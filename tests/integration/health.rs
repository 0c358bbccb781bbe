//! Health endpoint integration tests
//!
//! Tests for the health check endpoints:
//! - GET /health - Full health check with dependency status
//! - GET /health/ready - Readiness probe
//! - GET /health/live - Liveness probe
//! - GET /metrics - Prometheus exposition

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::test_app;

#[tokio::test]
async fn test_health_reports_both_dependencies() {
    let app = test_app();

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["checks"]["store"]["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_is_unavailable_when_store_is_down() {
    let app = test_app();
    app.store.set_unavailable(true);

    let response = app.server.get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["checks"]["store"]["status"], "unhealthy");
    assert!(json["checks"]["store"]["error"].is_string());
    assert_eq!(json["checks"]["database"]["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_requires_database() {
    let app = test_app();

    app.server.get("/health/ready").await.assert_status_ok();

    app.repository.set_failing(true);
    let response = app.server.get("/health/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
}

#[tokio::test]
async fn test_liveness_ignores_dependencies() {
    let app = test_app();
    app.store.set_unavailable(true);
    app.repository.set_failing(true);

    let response = app.server.get("/health/live").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = test_app();
    recipe_service::routes::metrics::init_metrics();

    app.server.get("/metrics").await.assert_status_ok();
}

#[tokio::test]
async fn test_unrouted_requests() {
    let app = test_app();

    app.server
        .get("/recipes")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    app.server
        .get("/nope")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
