// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures shared by the calculator, the dispatcher and the HTTP layer.
//
// Everything here is transient: built per request or per sweep, never cached.
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// SALES HISTORY
// =============================================================================
/// One completed order line referencing a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Calendar day the order was completed
    pub date: NaiveDate,

    /// Units sold on that line
    pub quantity: i32,
}

impl SaleRecord {
    pub fn new(date: NaiveDate, quantity: i32) -> Self {
        Self { date, quantity }
    }
}

// =============================================================================
// PRODUCT SNAPSHOT
// =============================================================================
// A read-only view of a catalog product with only the fields the reorder
// logic needs. The catalog itself belongs to the store.
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: i64,

    /// Display name, used in notification text
    pub name: String,

    /// Current stock; None when stock is not tracked
    pub stock_quantity: Option<i32>,

    /// Whether the store manages stock for this product
    pub managing_stock: bool,

    /// Per-product low-stock threshold override
    pub low_stock_amount: Option<i32>,

    /// Per-product supplier lead time override, in days
    pub lead_time_days: Option<i32>,
}

impl ProductSnapshot {
    /// Stock level the reorder logic may act on.
    ///
    /// Returns None when the product is unmanaged or its stock is unknown;
    /// every stock rule short-circuits in that case.
    pub fn tracked_stock(&self) -> Option<i32> {
        if self.managing_stock {
            self.stock_quantity
        } else {
            None
        }
    }

    /// Product override if set, else the global default
    pub fn low_stock_threshold(&self, default: i32) -> i32 {
        self.low_stock_amount.unwrap_or(default)
    }
}

// -----------------------------------------------------------------------------
// STOCK STATUS
// -----------------------------------------------------------------------------
/// Stock status as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    /// Value stored in products.stock_status
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
            StockStatus::OnBackorder => "onbackorder",
        }
    }
}

// =============================================================================
// REORDER COMPUTATION
// =============================================================================
/// Output of one reorder point calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderComputationResult {
    /// Average units sold per day over the observed span
    pub daily_demand: f64,

    /// Lead time actually applied (override or default, at least 1)
    pub lead_time_days: i32,

    /// Buffer covering demand variability
    pub safety_stock: i32,

    /// ceil(daily_demand * lead_time_days + safety_stock)
    pub reorder_point: i32,
}

impl ReorderComputationResult {
    /// Value used when nothing could be computed
    pub const ZERO: Self = Self {
        daily_demand: 0.0,
        lead_time_days: 1,
        safety_stock: 0,
        reorder_point: 0,
    };
}

/// Reorder report returned by GET /api/v1/products/:id/reorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderReport {
    pub product_id: i64,
    pub name: String,
    pub managing_stock: bool,
    pub stock_quantity: Option<i32>,
    #[serde(flatten)]
    pub computation: ReorderComputationResult,
    pub should_reorder: bool,

    /// Suggested quantity to bring stock up to the optimal level
    pub reorder_amount: Option<i32>,
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    OutOfStock,
    Reorder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LowStock => "low_stock",
            NotificationKind::OutOfStock => "out_of_stock",
            NotificationKind::Reorder => "reorder",
        }
    }
}

/// An alert produced by the dispatcher and handed to the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub product_id: i64,
    pub timestamp: DateTime<Utc>,

    /// Kind-specific values (stock, threshold, reorder point, ...)
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, product_id: i64, payload: serde_json::Value) -> Self {
        Self {
            kind,
            product_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

// =============================================================================
// API REQUEST/RESPONSE STRUCTURES
// =============================================================================

/// POST /api/v1/events/stock-changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChangedRequest {
    pub product_id: i64,
}

/// POST /api/v1/events/status-changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedRequest {
    pub product_id: i64,
    pub status: StockStatus,
}

/// POST /api/v1/events/order-completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedRequest {
    pub order_id: i64,
}

/// Response for every event endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub notifications: Vec<NotificationEvent>,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(managing_stock: bool, stock_quantity: Option<i32>) -> ProductSnapshot {
        ProductSnapshot {
            product_id: 1,
            name: "Widget".to_string(),
            stock_quantity,
            managing_stock,
            low_stock_amount: None,
            lead_time_days: None,
        }
    }

    #[test]
    fn test_tracked_stock_requires_managed_and_known_quantity() {
        assert_eq!(product(true, Some(4)).tracked_stock(), Some(4));
        assert_eq!(product(true, None).tracked_stock(), None);
        assert_eq!(product(false, Some(4)).tracked_stock(), None);
    }

    #[test]
    fn test_low_stock_threshold_override() {
        let mut p = product(true, Some(4));
        assert_eq!(p.low_stock_threshold(2), 2);
        p.low_stock_amount = Some(0);
        assert_eq!(p.low_stock_threshold(2), 0);
    }

    #[test]
    fn test_stock_status_wire_names() {
        let status: StockStatus = serde_json::from_str("\"outofstock\"").unwrap();
        assert_eq!(status, StockStatus::OutOfStock);
        assert_eq!(serde_json::to_string(&StockStatus::InStock).unwrap(), "\"instock\"");
    }

    #[test]
    fn test_notification_kind_serializes_like_label() {
        for kind in [
            NotificationKind::LowStock,
            NotificationKind::OutOfStock,
            NotificationKind::Reorder,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
