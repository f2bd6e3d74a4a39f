//! Metrics definitions for the room coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for the room coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the routed paths plus `/other`
//! - `status`: success, error, timeout
//! - `outcome`: one value per join/leave result (see `RoomError::outcome`)
//! - `operation`: bounded by code (join, leave, get_room, commit_room, ...)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used
/// by `GET /metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Provisioning is a remote call; tail goes into seconds
        .set_buckets_for_metric(
            Matcher::Prefix("rc_room_provision".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set room provision buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Also captures framework-level responses (415, JSON rejections, 404, 405).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed set of routed endpoints.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/metrics" => "/metrics",
        "/join-randomroom" => "/join-randomroom",
        "/leave-room" => "/leave-room",
        "/generate-management-token" => "/generate-management-token",
        _ => "/other",
    }
}

// ============================================================================
// Matchmaking Metrics
// ============================================================================

/// Record a join attempt.
///
/// Metric: `rc_join_total`
/// Labels: `outcome` (`joined`, `created`, or a `RoomError::outcome` value)
pub fn record_join(outcome: &'static str) {
    counter!("rc_join_total", "outcome" => outcome).increment(1);
}

/// Record a leave attempt.
///
/// Metric: `rc_leave_total`
/// Labels: `outcome` (`left`, `deleted`, or a `RoomError::outcome` value)
pub fn record_leave(outcome: &'static str) {
    counter!("rc_leave_total", "outcome" => outcome).increment(1);
}

/// Record an optimistic commit that lost to a concurrent writer.
///
/// Metric: `rc_registry_conflicts_total`
/// Labels: `operation`
pub fn record_registry_conflict(operation: &'static str) {
    counter!("rc_registry_conflicts_total", "operation" => operation).increment(1);
}

/// Record a room API provisioning call.
///
/// Metric: `rc_room_provision_duration_seconds`
/// Labels: `status`
pub fn record_room_provision(status: &'static str, duration: Duration) {
    histogram!("rc_room_provision_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `rc_db_query_duration_seconds`, `rc_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("rc_db_query_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());

    counter!("rc_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
