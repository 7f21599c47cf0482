// =============================================================================
// SALES HISTORY MODULE
// =============================================================================
// Reads completed-order line quantities for a product over a trailing window.
//
// The reader never fails: a data-source error is logged and counted, and the
// caller receives an empty history (zero demand, zero safety stock).
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use crate::metrics;
use crate::models::SaleRecord;

/// Longest trailing window the reader will look back over
pub const MAX_SALES_WINDOW_DAYS: i64 = 3650;

/// Source of completed sales, implemented by the database layer
#[async_trait]
pub trait SalesHistory: Send + Sync {
    /// One record per completed order line for `product_id` completed at or
    /// after `since`. Ordering is not required.
    async fn completed_sales(
        &self,
        product_id: i64,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SaleRecord>>;
}

// -----------------------------------------------------------------------------
// READER
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct SalesHistoryReader {
    source: Arc<dyn SalesHistory>,
    window_days: i64,
}

impl SalesHistoryReader {
    pub fn new(source: Arc<dyn SalesHistory>, window_days: i64) -> Self {
        Self {
            source,
            window_days: window_days.max(1),
        }
    }

    /// Start of the trailing window, or None when it falls outside the
    /// representable date range
    fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Duration::try_days(self.window_days).and_then(|window| now.checked_sub_signed(window))
    }

    /// Sales for the trailing window, most recent first.
    ///
    /// Returns an empty Vec for unsold products and on any source error.
    pub async fn read(&self, product_id: i64) -> Vec<SaleRecord> {
        let Some(since) = self.window_start(Utc::now()) else {
            error!(
                product_id,
                window_days = self.window_days,
                "Sales window out of range, treating as no sales"
            );
            metrics::record_history_failure();
            return Vec::new();
        };

        match self.source.completed_sales(product_id, since).await {
            Ok(mut records) => {
                records.sort_by(|a, b| b.date.cmp(&a.date));
                debug!(product_id, records = records.len(), "Loaded sales history");
                records
            }
            Err(e) => {
                error!(
                    product_id,
                    error = %e,
                    "Failed to read sales history, treating as no sales"
                );
                metrics::record_history_failure();
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct FixedHistory {
        records: Vec<SaleRecord>,
        last_since: Mutex<Option<DateTime<Utc>>>,
    }

    #[async_trait]
    impl SalesHistory for FixedHistory {
        async fn completed_sales(
            &self,
            _product_id: i64,
            since: DateTime<Utc>,
        ) -> anyhow::Result<Vec<SaleRecord>> {
            *self.last_since.lock().unwrap() = Some(since);
            Ok(self.records.clone())
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl SalesHistory for BrokenHistory {
        async fn completed_sales(
            &self,
            _product_id: i64,
            _since: DateTime<Utc>,
        ) -> anyhow::Result<Vec<SaleRecord>> {
            anyhow::bail!("connection reset")
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_read_orders_most_recent_first() {
        let source = Arc::new(FixedHistory {
            records: vec![
                SaleRecord::new(day(1), 3),
                SaleRecord::new(day(5), 1),
                SaleRecord::new(day(3), 2),
            ],
            last_since: Mutex::new(None),
        });
        let reader = SalesHistoryReader::new(source.clone(), 90);

        let records = reader.read(7).await;
        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(5), day(3), day(1)]);

        let since = source.last_since.lock().unwrap().expect("since recorded");
        let window = Utc::now() - since;
        assert!(window >= Duration::days(90));
        assert!(window < Duration::days(91));
    }

    #[tokio::test]
    async fn test_read_degrades_to_empty_on_oversized_window() {
        let source = Arc::new(FixedHistory {
            records: vec![SaleRecord::new(day(1), 3)],
            last_since: Mutex::new(None),
        });
        let reader = SalesHistoryReader::new(source.clone(), 1_000_000_000);

        assert!(reader.read(7).await.is_empty());
        assert!(source.last_since.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_degrades_to_empty_on_error() {
        let reader = SalesHistoryReader::new(Arc::new(BrokenHistory), 90);
        assert!(reader.read(7).await.is_empty());
    }
}
