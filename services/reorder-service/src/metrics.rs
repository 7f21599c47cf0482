// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the reorder service.
//
// Without an installed recorder (unit tests) every macro below is a no-op.
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::models::NotificationKind;

// =============================================================================
// METRIC NAMES
// =============================================================================

/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Labels: operation (select/insert)
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Labels: outcome (success/failed)
pub const REORDER_COMPUTATIONS_TOTAL: &str = "reorder_computations_total";

/// Distribution of computed reorder points, unlabelled
pub const REORDER_POINT_UNITS: &str = "reorder_point_units";

/// Sales history reads that degraded to an empty history
pub const SALES_HISTORY_FAILURES_TOTAL: &str = "sales_history_failures_total";

/// Labels: kind (low_stock/out_of_stock/reorder), status (sent/failed)
pub const NOTIFICATIONS_TOTAL: &str = "notifications_total";

pub const STOCK_SWEEP_DURATION_SECONDS: &str = "stock_sweep_duration_seconds";

/// Products evaluated by the last sweep
pub const STOCK_SWEEP_PRODUCTS: &str = "stock_sweep_products";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Install the Prometheus recorder and describe every metric.
///
/// Returns the handle used by GET /metrics to render the exposition text.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    // Sweeps walk the whole catalog, so they get a longer tail
    let sweep_buckets = &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0];

    let unit_buckets = &[0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(STOCK_SWEEP_DURATION_SECONDS.to_string()),
            sweep_buckets,
        )?
        .set_buckets_for_metric(Matcher::Full(REORDER_POINT_UNITS.to_string()), unit_buckets)?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");
    describe_counter!(
        REORDER_COMPUTATIONS_TOTAL,
        "Reorder point computations by outcome"
    );
    describe_histogram!(
        REORDER_POINT_UNITS,
        "Computed reorder points in stock units"
    );
    describe_counter!(
        SALES_HISTORY_FAILURES_TOTAL,
        "Sales history reads that failed and were treated as empty"
    );
    describe_counter!(
        NOTIFICATIONS_TOTAL,
        "Inventory notifications by kind and delivery status"
    );
    describe_histogram!(
        STOCK_SWEEP_DURATION_SECONDS,
        "Duration of scheduled low-stock sweeps in seconds"
    );
    describe_gauge!(
        STOCK_SWEEP_PRODUCTS,
        "Number of stock-managed products evaluated by the last sweep"
    );

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(
        DB_QUERY_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Record a reorder computation; `reorder_point` is None when it failed.
///
/// Per-product values stay in the logs; a product_id label would add one
/// series per catalog entry.
pub fn record_reorder_computation(reorder_point: Option<i32>) {
    let outcome = if reorder_point.is_some() { "success" } else { "failed" };
    counter!(REORDER_COMPUTATIONS_TOTAL, "outcome" => outcome).increment(1);

    if let Some(units) = reorder_point {
        histogram!(REORDER_POINT_UNITS).record(f64::from(units));
    }
}

pub fn record_history_failure() {
    counter!(SALES_HISTORY_FAILURES_TOTAL).increment(1);
}

pub fn record_notification(kind: NotificationKind, delivered: bool) {
    let status = if delivered { "sent" } else { "failed" };
    counter!(
        NOTIFICATIONS_TOTAL,
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
}

pub fn record_sweep(products: usize, duration_secs: f64) {
    histogram!(STOCK_SWEEP_DURATION_SECONDS).record(duration_secs);
    gauge!(STOCK_SWEEP_PRODUCTS).set(products as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_points_share_one_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_reorder_computation(Some(104));
            record_reorder_computation(Some(3));
            record_reorder_computation(Some(0));
            record_reorder_computation(None);
        });

        let rendered = handle.render();
        assert!(!rendered.contains("product_id"));
        assert!(rendered.contains("reorder_point_units_count 3"));
        assert!(rendered.contains(r#"reorder_computations_total{outcome="success"} 3"#));
        assert!(rendered.contains(r#"reorder_computations_total{outcome="failed"} 1"#));
    }
}
