// =============================================================================
// DISPATCHER MODULE
// =============================================================================
// Stock event dispatcher.
//
// Each trigger (stock change, status change, completed order, sweep) is
// handled independently: load the product snapshot, compare stock against
// the low-stock threshold and the reorder point, emit notifications.
// No transition state is stored, so an unchanged low-stock condition is
// reported again on the next trigger (at-least-once).
//
// Handlers never fail. Catalog errors are logged and produce no events;
// notifier errors are logged and do not stop the remaining events.
// =============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::catalog::ProductCatalog;
use crate::metrics;
use crate::models::{NotificationEvent, NotificationKind, ProductSnapshot, StockStatus};
use crate::notifier::{AlertMail, Notifier};
use crate::reorder::ReorderCalculator;

/// Alert inputs injected from Config
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    /// Threshold applied when a product has no low_stock_amount
    pub default_low_stock_threshold: i32,

    /// Resolved recipient (notification email, else admin email)
    pub recipient: String,
}

#[derive(Clone)]
pub struct StockEventDispatcher {
    catalog: Arc<dyn ProductCatalog>,
    calculator: ReorderCalculator,
    notifier: Arc<dyn Notifier>,
    alerts: AlertSettings,
}

impl StockEventDispatcher {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        calculator: ReorderCalculator,
        notifier: Arc<dyn Notifier>,
        alerts: AlertSettings,
    ) -> Self {
        Self {
            catalog,
            calculator,
            notifier,
            alerts,
        }
    }

    pub fn calculator(&self) -> &ReorderCalculator {
        &self.calculator
    }

    // -------------------------------------------------------------------------
    // EVENT HANDLERS
    // -------------------------------------------------------------------------

    /// Stock quantity of a product changed
    pub async fn on_stock_changed(&self, product_id: i64) -> Vec<NotificationEvent> {
        match self.load_product(product_id).await {
            Some(product) => self.evaluate_stock(&product).await,
            None => Vec::new(),
        }
    }

    /// Stock status of a product changed; only "out of stock" notifies.
    ///
    /// The product lookup is only used for the name in the mail, so a
    /// catalog failure still produces the notification.
    pub async fn on_status_changed(
        &self,
        product_id: i64,
        status: StockStatus,
    ) -> Vec<NotificationEvent> {
        if status != StockStatus::OutOfStock {
            debug!(product_id, ?status, "Stock status change needs no notification");
            return Vec::new();
        }

        let name = self.load_product(product_id).await.map(|p| p.name);
        let event = NotificationEvent::new(
            NotificationKind::OutOfStock,
            product_id,
            json!({ "name": name, "status": status }),
        );

        self.deliver(&event).await;
        vec![event]
    }

    /// An order completed: re-check every stock-managed product on it
    pub async fn on_order_completed(&self, order_id: i64) -> Vec<NotificationEvent> {
        let product_ids = match self.catalog.order_product_ids(order_id).await {
            Ok(Some(ids)) => ids,
            Ok(None) => {
                warn!(order_id, "Completed order not found in catalog");
                return Vec::new();
            }
            Err(e) => {
                error!(order_id, error = %e, "Failed to load order line items");
                return Vec::new();
            }
        };

        // Several lines for one product are evaluated once
        let unique: BTreeSet<i64> = product_ids.into_iter().collect();

        let mut events = Vec::new();
        for product_id in unique {
            let Some(product) = self.load_product(product_id).await else {
                continue;
            };
            if !product.managing_stock {
                continue;
            }
            events.extend(self.evaluate_stock(&product).await);
        }

        info!(order_id, notifications = events.len(), "Processed completed order");
        events
    }

    /// Re-check every stock-managed product
    pub async fn sweep(&self) -> Vec<NotificationEvent> {
        let start = Instant::now();

        let products = match self.catalog.managed_products().await {
            Ok(products) => products,
            Err(e) => {
                error!(error = %e, "Failed to list stock-managed products for sweep");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for product in &products {
            events.extend(self.evaluate_stock(product).await);
        }

        let duration = start.elapsed().as_secs_f64();
        metrics::record_sweep(products.len(), duration);
        info!(
            products = products.len(),
            notifications = events.len(),
            duration_secs = duration,
            "Low-stock sweep finished"
        );

        events
    }

    /// Run `sweep` forever, once per `every`. The first sweep starts immediately.
    pub async fn run_scheduled_sweeps(self, every: Duration) {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = every.as_secs(), "Scheduled low-stock sweeps started");

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    // -------------------------------------------------------------------------
    // STOCK EVALUATION
    // -------------------------------------------------------------------------

    /// Low-stock and reorder checks for one snapshot.
    ///
    /// Unmanaged products and unknown stock produce nothing.
    pub async fn evaluate_stock(&self, product: &ProductSnapshot) -> Vec<NotificationEvent> {
        let Some(stock) = product.tracked_stock() else {
            debug!(product_id = product.product_id, "Stock not tracked, skipping");
            return Vec::new();
        };

        let mut events = Vec::new();

        let threshold = product.low_stock_threshold(self.alerts.default_low_stock_threshold);
        if stock <= threshold {
            events.push(NotificationEvent::new(
                NotificationKind::LowStock,
                product.product_id,
                json!({
                    "name": product.name,
                    "stock": stock,
                    "threshold": threshold,
                }),
            ));
        }

        let assessment = self.calculator.assess(product).await;
        if assessment.should_reorder {
            let computation = assessment.computation;
            events.push(NotificationEvent::new(
                NotificationKind::Reorder,
                product.product_id,
                json!({
                    "name": product.name,
                    "stock": stock,
                    "reorder_point": computation.reorder_point,
                    "daily_demand": computation.daily_demand,
                    "lead_time_days": computation.lead_time_days,
                    "safety_stock": computation.safety_stock,
                    "reorder_amount": self.calculator.reorder_amount(product),
                }),
            ));
        }

        for event in &events {
            self.deliver(event).await;
        }

        events
    }

    async fn load_product(&self, product_id: i64) -> Option<ProductSnapshot> {
        match self.catalog.product(product_id).await {
            Ok(Some(product)) => Some(product),
            Ok(None) => {
                warn!(product_id, "Product not found in catalog");
                None
            }
            Err(e) => {
                error!(product_id, error = %e, "Failed to load product snapshot");
                None
            }
        }
    }

    async fn deliver(&self, event: &NotificationEvent) {
        let mail = AlertMail::render(event.clone(), self.alerts.recipient.clone());

        match self.notifier.send(&mail).await {
            Ok(()) => metrics::record_notification(event.kind, true),
            Err(e) => {
                error!(
                    kind = event.kind.as_str(),
                    product_id = event.product_id,
                    error = %e,
                    "Failed to send inventory notification"
                );
                metrics::record_notification(event.kind, false);
            }
        }
    }
}
