// =============================================================================
// DATABASE MODULE
// =============================================================================
// PostgreSQL access for the reorder service.
//
// The products/orders tables belong to the store and are only read here.
// The one table this service writes is notification_outbox.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::history::SalesHistory;
use crate::metrics;
use crate::models::{ProductSnapshot, SaleRecord, StockStatus};
use crate::notifier::AlertMail;

/// product_meta key holding the supplier lead time override
pub const LEAD_TIME_META_KEY: &str = "lead_time_days";

// -----------------------------------------------------------------------------
// DATABASE WRAPPER
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

// -----------------------------------------------------------------------------
// ROW TYPES
// -----------------------------------------------------------------------------
#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    manage_stock: bool,
    stock_quantity: Option<i32>,
    low_stock_amount: Option<i32>,
    lead_time_meta: Option<String>,
}

impl ProductRow {
    fn into_snapshot(self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            lead_time_days: parse_lead_time(self.id, self.lead_time_meta.as_deref()),
            name: self.name,
            stock_quantity: self.stock_quantity,
            managing_stock: self.manage_stock,
            low_stock_amount: self.low_stock_amount,
        }
    }
}

/// Meta values are free text; blank or unparsable means "no override"
fn parse_lead_time(product_id: i64, raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i32>() {
        Ok(days) => Some(days),
        Err(_) => {
            warn!(product_id, value = raw, "Ignoring unparsable lead time override");
            None
        }
    }
}

/// (sku, name, manage_stock, stock, low_stock_amount, lead time meta)
type SampleProduct = (&'static str, &'static str, bool, Option<i32>, Option<i32>, Option<&'static str>);

const SAMPLE_PRODUCTS: [SampleProduct; 5] = [
    ("SKU-BEANS-001", "Espresso Beans 1kg", true, Some(5), None, Some("7")),
    ("SKU-FILTER-001", "Paper Filters (100)", true, Some(1), Some(3), None),
    ("SKU-GRINDER-001", "Burr Grinder", true, Some(12), None, Some("21")),
    ("SKU-MUG-001", "Ceramic Mug", true, Some(0), None, None),
    ("SKU-GIFT-001", "Gift Card", false, None, None, None),
];

/// Stock status a seeded product starts with, consistent with its quantity
fn initial_stock_status(stock: Option<i32>) -> StockStatus {
    match stock {
        Some(quantity) if quantity <= 0 => StockStatus::OutOfStock,
        _ => StockStatus::InStock,
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.manage_stock, p.stock_quantity, p.low_stock_amount,
           m.meta_value AS lead_time_meta
    FROM products p
    LEFT JOIN product_meta m
           ON m.product_id = p.id AND m.meta_key = $1
"#;

impl Database {
    // -------------------------------------------------------------------------
    // CONNECTION
    // -------------------------------------------------------------------------
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    /// Pool that only connects on first use; no connection is opened here
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy(database_url)
            .context("Invalid PostgreSQL connection URL")?;

        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // MIGRATIONS
    // -------------------------------------------------------------------------
    /// Create the tables if they don't exist and seed sample data when empty
    pub async fn run_migrations(&self) -> Result<()> {
        let statements = [
            (
                "products",
                r#"
                CREATE TABLE IF NOT EXISTS products (
                    id BIGSERIAL PRIMARY KEY,
                    sku VARCHAR(50) UNIQUE NOT NULL,
                    name VARCHAR(255) NOT NULL,
                    manage_stock BOOLEAN NOT NULL DEFAULT TRUE,
                    -- NULL when stock is not tracked
                    stock_quantity INTEGER,
                    stock_status VARCHAR(20) NOT NULL DEFAULT 'instock',
                    -- NULL means "use the global threshold"
                    low_stock_amount INTEGER,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "product_meta",
                r#"
                CREATE TABLE IF NOT EXISTS product_meta (
                    product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                    meta_key VARCHAR(255) NOT NULL,
                    meta_value TEXT,
                    PRIMARY KEY (product_id, meta_key)
                )
                "#,
            ),
            (
                "orders",
                r#"
                CREATE TABLE IF NOT EXISTS orders (
                    id BIGSERIAL PRIMARY KEY,
                    status VARCHAR(20) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    completed_at TIMESTAMPTZ
                )
                "#,
            ),
            (
                "order_line_items",
                r#"
                CREATE TABLE IF NOT EXISTS order_line_items (
                    id BIGSERIAL PRIMARY KEY,
                    order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                    product_id BIGINT NOT NULL,
                    quantity INTEGER NOT NULL,
                    CONSTRAINT non_negative_quantity CHECK (quantity >= 0)
                )
                "#,
            ),
            (
                "notification_outbox",
                r#"
                CREATE TABLE IF NOT EXISTS notification_outbox (
                    id UUID PRIMARY KEY,
                    kind VARCHAR(20) NOT NULL,
                    product_id BIGINT NOT NULL,
                    recipient VARCHAR(255) NOT NULL,
                    subject TEXT NOT NULL,
                    body TEXT NOT NULL,
                    payload JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "line item product index",
                "CREATE INDEX IF NOT EXISTS idx_line_items_product ON order_line_items(product_id)",
            ),
            (
                "order status index",
                "CREATE INDEX IF NOT EXISTS idx_orders_status_completed ON orders(status, completed_at)",
            ),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create {}", name))?;
        }

        self.seed_sample_data().await?;

        Ok(())
    }

    /// Seed a small catalog with recent completed orders
    async fn seed_sample_data(&self) -> Result<()> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        if count.0 > 0 {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(SAMPLE_PRODUCTS.len());
        for (sku, name, manage_stock, stock, low_stock, lead_time) in SAMPLE_PRODUCTS {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO products
                    (sku, name, manage_stock, stock_quantity, stock_status, low_stock_amount)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(sku)
            .bind(name)
            .bind(manage_stock)
            .bind(stock)
            .bind(initial_stock_status(stock).as_str())
            .bind(low_stock)
            .fetch_one(&self.pool)
            .await?;

            if let Some(days) = lead_time {
                sqlx::query(
                    "INSERT INTO product_meta (product_id, meta_key, meta_value) VALUES ($1, $2, $3)",
                )
                .bind(id)
                .bind(LEAD_TIME_META_KEY)
                .bind(days)
                .execute(&self.pool)
                .await?;
            }

            ids.push(id);
        }

        // (days ago, product index, quantity)
        let sample_sales = [(3, 0, 10), (2, 0, 20), (1, 0, 10), (10, 1, 4), (1, 1, 2), (30, 2, 1), (5, 3, 6)];

        for (days_ago, product, quantity) in sample_sales {
            let (order_id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO orders (status, created_at, completed_at)
                VALUES ('completed', NOW() - make_interval(days => $1), NOW() - make_interval(days => $1))
                RETURNING id
                "#,
            )
            .bind(days_ago)
            .fetch_one(&self.pool)
            .await?;

            sqlx::query(
                "INSERT INTO order_line_items (order_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(order_id)
            .bind(ids[product])
            .bind(quantity)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // OUTBOX
    // -------------------------------------------------------------------------

    /// Queue a rendered alert mail, returning the outbox row id
    pub async fn enqueue_notification(&self, mail: &AlertMail) -> Result<Uuid> {
        let start = Instant::now();
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notification_outbox
                (id, kind, product_id, recipient, subject, body, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(mail.event.kind.as_str())
        .bind(mail.event.product_id)
        .bind(&mail.recipient)
        .bind(&mail.subject)
        .bind(&mail.body)
        .bind(&mail.event.payload)
        .bind(mail.event.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert notification into outbox")?;

        metrics::record_db_query("insert", start.elapsed().as_secs_f64());
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // HEALTH CHECK
    // -------------------------------------------------------------------------
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// SALES HISTORY
// =============================================================================
#[async_trait]
impl SalesHistory for Database {
    async fn completed_sales(
        &self,
        product_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<SaleRecord>> {
        let start = Instant::now();

        let rows: Vec<(NaiveDate, i32)> = sqlx::query_as(
            r#"
            SELECT (o.completed_at AT TIME ZONE 'UTC')::date AS sale_date, li.quantity
            FROM order_line_items li
            JOIN orders o ON o.id = li.order_id
            WHERE li.product_id = $1
              AND o.status = 'completed'
              AND o.completed_at >= $2
            ORDER BY o.completed_at DESC
            "#,
        )
        .bind(product_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch sales history")?;

        metrics::record_db_query("select", start.elapsed().as_secs_f64());

        Ok(rows
            .into_iter()
            .map(|(date, quantity)| SaleRecord::new(date, quantity))
            .collect())
    }
}

// =============================================================================
// PRODUCT CATALOG
// =============================================================================
#[async_trait]
impl ProductCatalog for Database {
    async fn product(&self, product_id: i64) -> Result<Option<ProductSnapshot>> {
        let sql = format!("{} WHERE p.id = $2", PRODUCT_SELECT);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(LEAD_TIME_META_KEY)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product")?;

        Ok(row.map(ProductRow::into_snapshot))
    }

    async fn managed_products(&self) -> Result<Vec<ProductSnapshot>> {
        let start = Instant::now();
        let sql = format!("{} WHERE p.manage_stock ORDER BY p.id", PRODUCT_SELECT);
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(LEAD_TIME_META_KEY)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch stock-managed products")?;

        metrics::record_db_query("select", start.elapsed().as_secs_f64());
        Ok(rows.into_iter().map(ProductRow::into_snapshot).collect())
    }

    async fn order_product_ids(&self, order_id: i64) -> Result<Option<Vec<i64>>> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order")?;

        if exists.is_none() {
            return Ok(None);
        }

        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT product_id FROM order_line_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch order line items")?;

        Ok(Some(ids.into_iter().map(|(id,)| id).collect()))
    }
}
