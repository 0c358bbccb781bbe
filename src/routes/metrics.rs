//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "recipe_service_rate_limit_decisions_total",
        "Rate limit checks by outcome (admit, reject, error)"
    );
    metrics::describe_counter!(
        "recipe_service_cache_operations_total",
        "Recipe cache operations by result"
    );
}

/// Prometheus metrics endpoint handler
///
/// Returns metrics in Prometheus text format for scraping.
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record the outcome of a rate limit check
pub fn record_rate_limit_decision(decision: &'static str) {
    metrics::counter!("recipe_service_rate_limit_decisions_total", "decision" => decision)
        .increment(1);
}

/// Record cache operation
pub fn record_cache_operation(operation: &'static str, result: &'static str) {
    metrics::counter!(
        "recipe_service_cache_operations_total",
        "operation" => operation,
        "result" => result
    )
    .increment(1);
}
