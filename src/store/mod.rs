// ============================================================================
// Order Store - Persistence Layer
// ============================================================================
//
// `OrderStore` is the capability the aggregate service depends on. Two
// implementations honor the same atomicity and version contracts:
// - `PgOrderStore`        - PostgreSQL via sqlx
// - `InMemoryOrderStore`  - substitutable fake for tests
//
// ============================================================================

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;

use crate::domain::order::{Order, OrderId, OrderItem, OrderStoreError};

pub use memory::{FailPoint, InMemoryOrderStore};
pub use postgres::{PgOrderStore, PoolConfig};
pub use schema::ensure_schema;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the header and the items decoded from `order_data` in one
    /// transaction. Returns the header rows affected.
    async fn create_order(&self, order: &Order) -> Result<u64, OrderStoreError>;

    /// Compare-and-swap on `order_version`. Writes `order_data` and `status`
    /// and advances the version by one when the stored version equals
    /// `expected_version`.
    async fn update_order(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<u64, OrderStoreError>;

    async fn get_order_by_id(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;

    /// Insert a single item row outside the aggregate creation path.
    async fn create_order_item(&self, item: &OrderItem) -> Result<u64, OrderStoreError>;

    /// Item rows of an order in insertion order. Empty for unknown orders.
    async fn list_order_items(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderItem>, OrderStoreError>;
}
