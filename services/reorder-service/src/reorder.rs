// =============================================================================
// REORDER MODULE
// =============================================================================
// Reorder point engine.
//
// The free functions are pure: history + product + settings in, numbers out.
// ReorderCalculator composes them with the sales history reader and turns
// every failure into a safe default (0 / false) after logging it.
//
// FORMULAS:
//   daily_demand  = total_quantity / max(1, days spanned, both ends inclusive)
//   safety_stock  = ceil(z * sqrt(Σ(day_total - daily_demand)² / n))
//   reorder_point = ceil(daily_demand * lead_time_days + safety_stock)
// =============================================================================

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::error::ComputationError;
use crate::history::SalesHistoryReader;
use crate::metrics;
use crate::models::{ProductSnapshot, ReorderComputationResult, SaleRecord};

/// z-score for a 95% target service level
pub const DEFAULT_SERVICE_LEVEL_FACTOR: f64 = 1.96;

// -----------------------------------------------------------------------------
// SETTINGS
// -----------------------------------------------------------------------------
/// Global inputs to the calculation, injected from Config
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderSettings {
    /// Lead time applied when the product has no valid override
    pub default_lead_time_days: i32,

    /// Multiplier on demand standard deviation
    pub service_level_factor: f64,

    /// Target level for reorder-amount suggestions
    pub optimal_stock_level: i32,
}

impl Default for ReorderSettings {
    fn default() -> Self {
        Self {
            default_lead_time_days: 7,
            service_level_factor: DEFAULT_SERVICE_LEVEL_FACTOR,
            optimal_stock_level: 10,
        }
    }
}

// =============================================================================
// DEMAND ESTIMATION
// =============================================================================

/// Average units sold per day.
///
/// The span counts calendar days from the oldest to the most recent sale,
/// both included, so sales on a single day give a span of 1.
/// Empty history gives 0.0.
pub fn estimate_daily_demand(history: &[SaleRecord]) -> f64 {
    let Some((oldest, newest)) = date_bounds(history) else {
        return 0.0;
    };

    let total: i64 = history.iter().map(|r| i64::from(r.quantity)).sum();
    let span_days = ((newest - oldest).num_days() + 1).max(1);

    total as f64 / span_days as f64
}

fn date_bounds(history: &[SaleRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let oldest = history.iter().map(|r| r.date).min()?;
    let newest = history.iter().map(|r| r.date).max()?;
    Some((oldest, newest))
}

/// Sum of quantities per calendar day, oldest day first.
///
/// Only days with at least one record appear; days without sales are not
/// filled in as zeros.
pub fn daily_totals(history: &[SaleRecord]) -> Vec<i64> {
    let mut buckets: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for record in history {
        *buckets.entry(record.date).or_default() += i64::from(record.quantity);
    }
    buckets.into_values().collect()
}

// =============================================================================
// SAFETY STOCK
// =============================================================================

/// Safety stock from the population deviation of observed daily totals
/// around `avg_demand`.
///
/// Returns 0 for an empty history or a non-positive average demand.
/// Sparse sellers get an upward-biased deviation because only observed
/// sale days are counted.
pub fn estimate_safety_stock(
    history: &[SaleRecord],
    avg_demand: f64,
    service_level_factor: f64,
) -> Result<i32, ComputationError> {
    if history.is_empty() || avg_demand <= 0.0 {
        return Ok(0);
    }

    let totals = daily_totals(history);
    let n = totals.len() as f64;
    let variance = totals
        .iter()
        .map(|&qty| {
            let diff = qty as f64 - avg_demand;
            diff * diff
        })
        .sum::<f64>()
        / n;

    let std_dev = variance.sqrt();
    to_units("safety stock", service_level_factor * std_dev)
}

// =============================================================================
// LEAD TIME & REORDER POINT
// =============================================================================

/// Product override when set and at least one day, else the default.
/// Never below 1.
pub fn resolve_lead_time(product: &ProductSnapshot, default_days: i32) -> i32 {
    product
        .lead_time_days
        .filter(|days| *days >= 1)
        .unwrap_or(default_days)
        .max(1)
}

/// ceil(daily_demand * lead_time_days + safety_stock)
pub fn reorder_point(
    daily_demand: f64,
    lead_time_days: i32,
    safety_stock: i32,
) -> Result<i32, ComputationError> {
    to_units(
        "reorder point",
        daily_demand * f64::from(lead_time_days) + f64::from(safety_stock),
    )
}

/// Round a non-negative quantity up to whole units
fn to_units(stage: &'static str, value: f64) -> Result<i32, ComputationError> {
    if !value.is_finite() {
        return Err(ComputationError::NonFinite { stage, value });
    }
    let units = value.ceil();
    if units < 0.0 || units > f64::from(i32::MAX) {
        return Err(ComputationError::OutOfRange { stage, value });
    }
    Ok(units as i32)
}

/// Full reorder computation for one product. Pure: no I/O, no logging.
pub fn compute_reorder(
    history: &[SaleRecord],
    product: &ProductSnapshot,
    settings: &ReorderSettings,
) -> Result<ReorderComputationResult, ComputationError> {
    if let Some(bad) = history.iter().find(|r| r.quantity < 0) {
        return Err(ComputationError::NegativeQuantity {
            date: bad.date,
            quantity: bad.quantity,
        });
    }

    let daily_demand = estimate_daily_demand(history);
    if !daily_demand.is_finite() {
        return Err(ComputationError::NonFinite {
            stage: "daily demand",
            value: daily_demand,
        });
    }

    let lead_time_days = resolve_lead_time(product, settings.default_lead_time_days);
    let safety_stock = estimate_safety_stock(history, daily_demand, settings.service_level_factor)?;
    let reorder_point = reorder_point(daily_demand, lead_time_days, safety_stock)?;

    Ok(ReorderComputationResult {
        daily_demand,
        lead_time_days,
        safety_stock,
        reorder_point,
    })
}

/// Units needed to bring `current_stock` up to `optimal_stock`, never negative
pub fn reorder_amount(optimal_stock: i32, current_stock: i32) -> i32 {
    optimal_stock.saturating_sub(current_stock).max(0)
}

// =============================================================================
// CALCULATOR
// =============================================================================
/// Outcome of evaluating one product against its reorder point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReorderAssessment {
    /// Computed values, or ReorderComputationResult::ZERO after a failure
    pub computation: ReorderComputationResult,
    pub should_reorder: bool,
}

#[derive(Clone)]
pub struct ReorderCalculator {
    history: SalesHistoryReader,
    settings: ReorderSettings,
}

impl ReorderCalculator {
    pub fn new(history: SalesHistoryReader, settings: ReorderSettings) -> Self {
        Self { history, settings }
    }

    /// Fetch history and run the computation, logging the outcome
    pub async fn compute(
        &self,
        product: &ProductSnapshot,
    ) -> Result<ReorderComputationResult, ComputationError> {
        let history = self.history.read(product.product_id).await;

        match compute_reorder(&history, product, &self.settings) {
            Ok(result) => {
                info!(
                    product_id = product.product_id,
                    daily_demand = result.daily_demand,
                    lead_time_days = result.lead_time_days,
                    safety_stock = result.safety_stock,
                    reorder_point = result.reorder_point,
                    "Computed reorder point"
                );
                metrics::record_reorder_computation(Some(result.reorder_point));
                Ok(result)
            }
            Err(e) => {
                error!(
                    product_id = product.product_id,
                    sales_records = history.len(),
                    error = %e,
                    "Reorder computation failed"
                );
                metrics::record_reorder_computation(None);
                Err(e)
            }
        }
    }

    /// Reorder point, or 0 when it cannot be computed
    pub async fn calculate_reorder_point(&self, product: &ProductSnapshot) -> i32 {
        self.compute(product)
            .await
            .map(|r| r.reorder_point)
            .unwrap_or(0)
    }

    /// Whether tracked stock is at or below the reorder point.
    ///
    /// False without touching sales history when the product is unmanaged
    /// or its stock is unknown, and false when the computation fails.
    pub async fn should_reorder(&self, product: &ProductSnapshot) -> bool {
        self.assess(product).await.should_reorder
    }

    /// Reorder point and decision from a single computation
    pub async fn assess(&self, product: &ProductSnapshot) -> ReorderAssessment {
        let Some(stock) = product.tracked_stock() else {
            return ReorderAssessment {
                computation: ReorderComputationResult::ZERO,
                should_reorder: false,
            };
        };

        match self.compute(product).await {
            Ok(computation) => ReorderAssessment {
                computation,
                should_reorder: stock <= computation.reorder_point,
            },
            Err(_) => ReorderAssessment {
                computation: ReorderComputationResult::ZERO,
                should_reorder: false,
            },
        }
    }

    /// Suggested order quantity, None when stock is not tracked
    pub fn reorder_amount(&self, product: &ProductSnapshot) -> Option<i32> {
        product
            .tracked_stock()
            .map(|stock| reorder_amount(self.settings.optimal_stock_level, stock))
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SalesHistory;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn product(stock: Option<i32>) -> ProductSnapshot {
        ProductSnapshot {
            product_id: 42,
            name: "Espresso Beans 1kg".to_string(),
            stock_quantity: stock,
            managing_stock: true,
            low_stock_amount: None,
            lead_time_days: None,
        }
    }

    fn scenario_b() -> Vec<SaleRecord> {
        vec![
            SaleRecord::new(day(3), 10),
            SaleRecord::new(day(2), 20),
            SaleRecord::new(day(1), 10),
        ]
    }

    // -------------------------------------------------------------------------
    // Pure math
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_history_is_all_zero() {
        let result = compute_reorder(&[], &product(Some(3)), &ReorderSettings::default()).unwrap();
        assert_eq!(result.daily_demand, 0.0);
        assert_eq!(result.safety_stock, 0);
        assert_eq!(result.reorder_point, 0);
        assert_eq!(result.lead_time_days, 7);
    }

    #[test]
    fn test_single_day_demand_equals_total() {
        let history = vec![
            SaleRecord::new(day(9), 4),
            SaleRecord::new(day(9), 6),
            SaleRecord::new(day(9), 1),
        ];
        assert_eq!(estimate_daily_demand(&history), 11.0);
    }

    #[test]
    fn test_scenario_a_same_day_lines() {
        let history = vec![SaleRecord::new(day(1), 10), SaleRecord::new(day(1), 5)];
        let result =
            compute_reorder(&history, &product(Some(50)), &ReorderSettings::default()).unwrap();

        assert_eq!(result.daily_demand, 15.0);
        assert_eq!(result.safety_stock, 0);
        assert_eq!(result.lead_time_days, 7);
        assert_eq!(result.reorder_point, 105);
    }

    #[test]
    fn test_scenario_b_three_days() {
        let result =
            compute_reorder(&scenario_b(), &product(Some(5)), &ReorderSettings::default()).unwrap();

        assert!((result.daily_demand - 40.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.safety_stock, 10);
        assert_eq!(result.reorder_point, 104);
    }

    #[test]
    fn test_daily_totals_bucket_by_day_without_zero_fill() {
        let history = vec![
            SaleRecord::new(day(10), 2),
            SaleRecord::new(day(1), 3),
            SaleRecord::new(day(10), 5),
        ];
        assert_eq!(daily_totals(&history), vec![3, 7]);
    }

    #[test]
    fn test_safety_stock_zero_without_demand() {
        let history = vec![SaleRecord::new(day(1), 0), SaleRecord::new(day(2), 0)];
        assert_eq!(estimate_safety_stock(&history, 0.0, 1.96), Ok(0));
        assert_eq!(estimate_safety_stock(&[], 5.0, 1.96), Ok(0));
    }

    #[test]
    fn test_sparse_seller_variance_uses_observed_days_only() {
        // Two sales 9 days apart: demand = 10 / 10 days = 1.0/day, but the
        // deviation is measured on the two observed totals (5 and 5) only.
        let history = vec![SaleRecord::new(day(10), 5), SaleRecord::new(day(1), 5)];
        let demand = estimate_daily_demand(&history);
        assert_eq!(demand, 1.0);
        // sqrt(((5-1)^2 + (5-1)^2) / 2) = 4, * 1.96 = 7.84
        assert_eq!(estimate_safety_stock(&history, demand, 1.96), Ok(8));
    }

    #[test]
    fn test_lead_time_resolution() {
        let mut p = product(Some(1));
        assert_eq!(resolve_lead_time(&p, 7), 7);
        p.lead_time_days = Some(14);
        assert_eq!(resolve_lead_time(&p, 7), 14);
        p.lead_time_days = Some(0);
        assert_eq!(resolve_lead_time(&p, 7), 7);
        p.lead_time_days = None;
        assert_eq!(resolve_lead_time(&p, 0), 1);
        assert_eq!(resolve_lead_time(&p, -3), 1);
    }

    #[test]
    fn test_reorder_point_monotone_in_lead_time() {
        let demand = 40.0 / 3.0;
        let mut previous = 0;
        for lead in 1..=60 {
            let rp = reorder_point(demand, lead, 10).unwrap();
            assert!(rp >= previous, "lead {} gave {} < {}", lead, rp, previous);
            previous = rp;
        }
    }

    #[test]
    fn test_compute_is_idempotent() {
        let settings = ReorderSettings::default();
        let p = product(Some(5));
        let first = compute_reorder(&scenario_b(), &p, &settings);
        let second = compute_reorder(&scenario_b(), &p, &settings);
        assert_eq!(first, second);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let history = vec![SaleRecord::new(day(2), -4)];
        let err = compute_reorder(&history, &product(Some(1)), &ReorderSettings::default())
            .unwrap_err();
        assert!(matches!(err, ComputationError::NegativeQuantity { quantity: -4, .. }));
    }

    #[test]
    fn test_out_of_range_reorder_point_rejected() {
        let err = reorder_point(f64::from(i32::MAX), 30, 0).unwrap_err();
        assert!(matches!(err, ComputationError::OutOfRange { .. }));
        let err = reorder_point(f64::NAN, 7, 0).unwrap_err();
        assert!(matches!(err, ComputationError::NonFinite { .. }));
    }

    #[test]
    fn test_reorder_amount() {
        assert_eq!(reorder_amount(10, 15), 0);
        assert_eq!(reorder_amount(10, 3), 7);
        assert_eq!(reorder_amount(10, -5), 15);
        assert_eq!(reorder_amount(10, i32::MIN), i32::MAX);
    }

    // -------------------------------------------------------------------------
    // Calculator
    // -------------------------------------------------------------------------

    struct CountingHistory {
        records: Vec<SaleRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SalesHistory for CountingHistory {
        async fn completed_sales(
            &self,
            _product_id: i64,
            _since: DateTime<Utc>,
        ) -> anyhow::Result<Vec<SaleRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    fn calculator(records: Vec<SaleRecord>) -> (ReorderCalculator, Arc<CountingHistory>) {
        let source = Arc::new(CountingHistory {
            records,
            calls: AtomicUsize::new(0),
        });
        let reader = SalesHistoryReader::new(source.clone(), 90);
        (ReorderCalculator::new(reader, ReorderSettings::default()), source)
    }

    #[tokio::test]
    async fn test_scenario_c_low_stock_triggers_reorder() {
        let (calc, _) = calculator(scenario_b());
        let p = product(Some(5));
        assert_eq!(calc.calculate_reorder_point(&p).await, 104);
        assert!(calc.should_reorder(&p).await);
    }

    #[tokio::test]
    async fn test_scenario_d_unmanaged_never_reorders() {
        let (calc, source) = calculator(scenario_b());
        let mut p = product(Some(0));
        p.managing_stock = false;

        assert!(!calc.should_reorder(&p).await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_stock_never_reorders() {
        let (calc, source) = calculator(scenario_b());
        assert!(!calc.should_reorder(&product(None)).await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stock_above_reorder_point() {
        let (calc, _) = calculator(scenario_b());
        assert!(!calc.should_reorder(&product(Some(105))).await);
        assert!(calc.should_reorder(&product(Some(104))).await);
    }

    #[tokio::test]
    async fn test_failed_computation_falls_back_to_defaults() {
        let (calc, _) = calculator(vec![SaleRecord::new(day(1), -1)]);
        let p = product(Some(0));
        assert_eq!(calc.calculate_reorder_point(&p).await, 0);
        assert!(!calc.should_reorder(&p).await);
    }

    #[tokio::test]
    async fn test_calculator_reorder_amount() {
        let (calc, _) = calculator(Vec::new());
        assert_eq!(calc.reorder_amount(&product(Some(15))), Some(0));
        assert_eq!(calc.reorder_amount(&product(Some(3))), Some(7));
        assert_eq!(calc.reorder_amount(&product(None)), None);
    }
}
