// =============================================================================
// CATALOG MODULE
// =============================================================================
// Read-only view of the store's products and orders. The database layer
// implements it against the store tables; tests use in-memory fakes.
// =============================================================================

use async_trait::async_trait;

use crate::models::ProductSnapshot;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Snapshot of one product, None if it does not exist
    async fn product(&self, product_id: i64) -> anyhow::Result<Option<ProductSnapshot>>;

    /// Every product whose stock is managed by the store
    async fn managed_products(&self) -> anyhow::Result<Vec<ProductSnapshot>>;

    /// Product ids on the lines of an order, None if the order does not exist
    async fn order_product_ids(&self, order_id: i64) -> anyhow::Result<Option<Vec<i64>>>;
}
