// =============================================================================
// REORDER SERVICE - Library Root
// =============================================================================
// Module tree plus the shared application state and HTTP router. The binary
// in main.rs wires configuration, database and background sweeps onto these.
// =============================================================================

pub mod catalog;     // Read-only product/order catalog trait
pub mod config;      // Configuration loading
pub mod db;          // PostgreSQL access
pub mod dispatcher;  // Stock event dispatcher
pub mod error;       // Error types
pub mod handlers;    // HTTP request handlers
pub mod history;     // Sales history reader
pub mod metrics;     // Prometheus metrics setup
pub mod models;      // Data structures
pub mod notifier;    // Alert mail rendering and delivery
pub mod reorder;     // Reorder point engine

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::catalog::ProductCatalog;
use crate::db::Database;
use crate::dispatcher::StockEventDispatcher;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
pub struct AppState {
    /// Connection pool, used directly by the readiness probe
    pub db: Database,

    /// Product lookups for the reorder report
    pub catalog: Arc<dyn ProductCatalog>,

    pub dispatcher: StockEventDispatcher,

    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

// -----------------------------------------------------------------------------
// ROUTES
// -----------------------------------------------------------------------------
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // ----- Health & Readiness -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Reorder reports -----
        .route("/api/v1/products/:id/reorder", get(handlers::reorder_report))
        // ----- Store event webhooks -----
        .route("/api/v1/events/stock-changed", post(handlers::stock_changed))
        .route("/api/v1/events/status-changed", post(handlers::status_changed))
        .route("/api/v1/events/order-completed", post(handlers::order_completed))
        .route("/api/v1/events/sweep", post(handlers::sweep))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
