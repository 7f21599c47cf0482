// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers.
//
// The event endpoints are webhooks called by the store when stock, stock
// status or an order changes. They always answer 200 with whatever
// notifications were emitted (possibly none).
// =============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::*;
use crate::AppState;

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "reorder-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /ready
///
/// 503 when the database is unreachable.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.db.health_check().await;

    if db_healthy {
        Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            checks: ReadinessChecks { database: true },
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// REORDER REPORT
// =============================================================================
/// GET /api/v1/products/:id/reorder
///
/// # Response
/// ```json
/// {
///   "product_id": 1,
///   "name": "Espresso Beans 1kg",
///   "managing_stock": true,
///   "stock_quantity": 5,
///   "daily_demand": 13.33,
///   "lead_time_days": 7,
///   "safety_stock": 10,
///   "reorder_point": 104,
///   "should_reorder": true,
///   "reorder_amount": 5
/// }
/// ```
pub async fn reorder_report(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ReorderReport>> {
    let start = Instant::now();

    let result = build_reorder_report(&state, product_id).await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request(
        "GET",
        "/api/v1/products/:id/reorder",
        status.as_u16(),
        duration,
    );

    result.map(Json)
}

async fn build_reorder_report(state: &AppState, product_id: i64) -> AppResult<ReorderReport> {
    if product_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "Product id must be positive, got {}",
            product_id
        )));
    }

    let product = state
        .catalog
        .product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", product_id)))?;

    let calculator = state.dispatcher.calculator();
    let computation = calculator.compute(&product).await?;
    let should_reorder = product
        .tracked_stock()
        .is_some_and(|stock| stock <= computation.reorder_point);

    Ok(ReorderReport {
        product_id: product.product_id,
        reorder_amount: calculator.reorder_amount(&product),
        name: product.name,
        managing_stock: product.managing_stock,
        stock_quantity: product.stock_quantity,
        computation,
        should_reorder,
    })
}

// =============================================================================
// EVENT WEBHOOKS
// =============================================================================

/// POST /api/v1/events/stock-changed
pub async fn stock_changed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StockChangedRequest>,
) -> Json<DispatchResponse> {
    let start = Instant::now();

    tracing::info!(product_id = request.product_id, "Stock changed event");
    let notifications = state.dispatcher.on_stock_changed(request.product_id).await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/events/stock-changed", 200, duration);

    Json(DispatchResponse { notifications })
}

/// POST /api/v1/events/status-changed
pub async fn status_changed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StatusChangedRequest>,
) -> Json<DispatchResponse> {
    let start = Instant::now();

    tracing::info!(
        product_id = request.product_id,
        status = ?request.status,
        "Stock status changed event"
    );
    let notifications = state
        .dispatcher
        .on_status_changed(request.product_id, request.status)
        .await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/events/status-changed", 200, duration);

    Json(DispatchResponse { notifications })
}

/// POST /api/v1/events/order-completed
pub async fn order_completed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderCompletedRequest>,
) -> Json<DispatchResponse> {
    let start = Instant::now();

    tracing::info!(order_id = request.order_id, "Order completed event");
    let notifications = state.dispatcher.on_order_completed(request.order_id).await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/events/order-completed", 200, duration);

    Json(DispatchResponse { notifications })
}

/// POST /api/v1/events/sweep
///
/// Runs the same sweep as the background schedule, immediately.
pub async fn sweep(State(state): State<Arc<AppState>>) -> Json<DispatchResponse> {
    let start = Instant::now();

    let notifications = state.dispatcher.sweep().await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/events/sweep", 200, duration);

    Json(DispatchResponse { notifications })
}
