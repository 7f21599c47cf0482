// =============================================================================
// NOTIFIER MODULE
// =============================================================================
// Turns NotificationEvents into alert mails and hands them off.
//
// Delivery is fire-and-forget: the dispatcher logs a failed send and moves
// on. Nothing here retries.
// =============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::db::Database;
use crate::models::{NotificationEvent, NotificationKind};

// -----------------------------------------------------------------------------
// ALERT MAIL
// -----------------------------------------------------------------------------
/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMail {
    pub event: NotificationEvent,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl AlertMail {
    /// Render subject and body for `event` from its payload
    pub fn render(event: NotificationEvent, recipient: impl Into<String>) -> Self {
        let payload = &event.payload;
        let name = payload_str(payload, "name").unwrap_or("Unnamed product");
        let stock = payload_i64(payload, "stock");

        let (subject, body) = match event.kind {
            NotificationKind::LowStock => (
                format!("Low stock alert: {}", name),
                format!(
                    "{} (#{}) is low in stock.\n\nCurrent stock: {}\nLow stock threshold: {}\n",
                    name,
                    event.product_id,
                    display(stock),
                    display(payload_i64(payload, "threshold")),
                ),
            ),
            NotificationKind::OutOfStock => (
                format!("Out of stock: {}", name),
                format!("{} (#{}) is out of stock.\n", name, event.product_id),
            ),
            NotificationKind::Reorder => (
                format!("Reorder suggested: {}", name),
                format!(
                    "{} (#{}) has reached its reorder point.\n\n\
                     Current stock: {}\n\
                     Reorder point: {}\n\
                     Average daily demand: {:.2}\n\
                     Lead time (days): {}\n\
                     Safety stock: {}\n\
                     Suggested order quantity: {}\n",
                    name,
                    event.product_id,
                    display(stock),
                    display(payload_i64(payload, "reorder_point")),
                    payload.get("daily_demand").and_then(Value::as_f64).unwrap_or(0.0),
                    display(payload_i64(payload, "lead_time_days")),
                    display(payload_i64(payload, "safety_stock")),
                    display(payload_i64(payload, "reorder_amount")),
                ),
            ),
        };

        Self {
            event,
            recipient: recipient.into(),
            subject,
            body,
        }
    }
}

fn payload_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn payload_i64(payload: &Value, key: &str) -> Option<i64> {
    payload.get(key).and_then(Value::as_i64)
}

fn display(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

// =============================================================================
// NOTIFIER TRAIT
// =============================================================================
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &AlertMail) -> anyhow::Result<()>;
}

// -----------------------------------------------------------------------------
// OUTBOX NOTIFIER
// -----------------------------------------------------------------------------
/// Queues mails in the notification_outbox table; the store's mailer drains it
#[derive(Clone)]
pub struct OutboxNotifier {
    db: Database,
}

impl OutboxNotifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, mail: &AlertMail) -> anyhow::Result<()> {
        let id = self.db.enqueue_notification(mail).await?;
        info!(
            outbox_id = %id,
            kind = mail.event.kind.as_str(),
            product_id = mail.event.product_id,
            recipient = %mail.recipient,
            "Queued inventory notification"
        );
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// LOG NOTIFIER
// -----------------------------------------------------------------------------
/// Writes the mail to the log only (local development)
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: &AlertMail) -> anyhow::Result<()> {
        info!(
            kind = mail.event.kind.as_str(),
            product_id = mail.event.product_id,
            recipient = %mail.recipient,
            subject = %mail.subject,
            body = %mail.body,
            "Inventory notification"
        );
        Ok(())
    }
}
