// =============================================================================
// REORDER SERVICE - Main Entry Point
// =============================================================================
// WHAT THIS SERVICE DOES:
// - Estimates daily demand and safety stock from 90 days of completed sales
// - Computes a reorder point per product (demand x lead time + safety stock)
// - Sends low-stock, out-of-stock and reorder notifications on stock events
// - Sweeps every stock-managed product on a schedule
// - Exposes Prometheus metrics for observability
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reorder_service::catalog::ProductCatalog;
use reorder_service::config::{Config, NotifierKind};
use reorder_service::db::Database;
use reorder_service::dispatcher::{AlertSettings, StockEventDispatcher};
use reorder_service::history::SalesHistoryReader;
use reorder_service::metrics::setup_metrics;
use reorder_service::notifier::{LogNotifier, Notifier, OutboxNotifier};
use reorder_service::reorder::ReorderCalculator;
use reorder_service::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Environment and logging
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok();

    // RUST_LOG controls log levels, e.g. RUST_LOG=info,reorder_service=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reorder_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Reorder Service...");

    // -------------------------------------------------------------------------
    // STEP 2: Configuration and metrics
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(
        port = config.port,
        default_lead_time_days = config.default_lead_time_days,
        default_low_stock_threshold = config.default_low_stock_threshold,
        sales_window_days = config.sales_window_days,
        notifier = ?config.notifier,
        "Configuration loaded"
    );

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 3: Database
    // -------------------------------------------------------------------------
    let db = Database::connect(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    // -------------------------------------------------------------------------
    // STEP 4: Wire the reorder engine
    // -------------------------------------------------------------------------
    let catalog: Arc<dyn ProductCatalog> = Arc::new(db.clone());
    let history = SalesHistoryReader::new(Arc::new(db.clone()), config.sales_window_days);
    let calculator = ReorderCalculator::new(history, config.reorder_settings());

    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Outbox => Arc::new(OutboxNotifier::new(db.clone())),
        NotifierKind::Log => Arc::new(LogNotifier),
    };

    let dispatcher = StockEventDispatcher::new(
        catalog.clone(),
        calculator,
        notifier,
        AlertSettings {
            default_low_stock_threshold: config.default_low_stock_threshold,
            recipient: config.alert_recipient(),
        },
    );

    // -------------------------------------------------------------------------
    // STEP 5: Scheduled low-stock sweeps
    // -------------------------------------------------------------------------
    tokio::spawn(
        dispatcher
            .clone()
            .run_scheduled_sweeps(Duration::from_secs(config.sweep_interval_secs)),
    );

    let state = Arc::new(AppState {
        db,
        catalog,
        dispatcher,
        metrics_handle,
    });

    let app = router(state);

    // -------------------------------------------------------------------------
    // STEP 6: Serve
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Reorder Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
