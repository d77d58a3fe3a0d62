use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::OrderStore;
use super::errors::OrderStoreError;
use super::models::{Order, OrderItem};
use super::value_objects::OrderId;

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: caller → OrderService → OrderStore
//
// Owns no storage logic. Store errors pass through unchanged and nothing is
// retried here: a version conflict goes back to the caller, who re-reads and
// decides again.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn create_order(&self, order: &Order) -> Result<u64, OrderStoreError> {
        debug!(order_id = %order.order_id, user_id = order.user_id, "Creating order");
        self.store.create_order(order).await
    }

    /// Apply `order`'s mutable fields if the stored version is still
    /// `expected_version`.
    ///
    /// A store reporting zero modified rows lost a race with another writer
    /// and is reported as `VersionConflict` with no observed version.
    pub async fn update_order(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<u64, OrderStoreError> {
        let rows_affected = self.store.update_order(order, expected_version).await?;

        if rows_affected == 0 {
            warn!(
                order_id = %order.order_id,
                expected_version,
                "Update matched no rows, reporting version conflict"
            );
            return Err(OrderStoreError::VersionConflict {
                order_id: order.order_id.clone(),
                expected: expected_version,
                actual: None,
            });
        }

        info!(
            order_id = %order.order_id,
            new_version = expected_version + 1,
            "Order updated"
        );
        Ok(rows_affected)
    }

    pub async fn get_order_by_id(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        self.store.get_order_by_id(order_id).await
    }

    pub async fn create_order_item(&self, item: &OrderItem) -> Result<u64, OrderStoreError> {
        self.store.create_order_item(item).await
    }

    pub async fn list_order_items(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderItem>, OrderStoreError> {
        self.store.list_order_items(order_id).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, INITIAL_ORDER_VERSION};
    use crate::store::{FailPoint, InMemoryOrderStore};

    const ITEMS: &str =
        r#"[{"user_id": 7, "sku_id": 100, "count": 2, "timestamp": "2024-05-01T10:00:00Z"}]"#;

    fn service() -> (OrderService, Arc<InMemoryOrderStore>) {
        let store = Arc::new(InMemoryOrderStore::new());
        (OrderService::new(store.clone()), store)
    }

    fn order_a1() -> Order {
        Order::new(OrderId::parse("A1").unwrap(), 7, ITEMS)
    }

    #[tokio::test]
    async fn test_create_update_then_stale_retry() {
        let (service, _) = service();

        assert_eq!(service.create_order(&order_a1()).await.unwrap(), 1);
        let created = service.get_order_by_id(&order_a1().order_id).await.unwrap();
        assert_eq!(created.order_version, 0);

        let paid = order_a1().with_status(OrderStatus::Paid);
        assert_eq!(service.update_order(&paid, 0).await.unwrap(), 1);
        let updated = service.get_order_by_id(&paid.order_id).await.unwrap();
        assert_eq!(updated.order_version, 1);
        assert_eq!(updated.status, OrderStatus::Paid);

        let err = service.update_order(&paid, 0).await.unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::VersionConflict { expected: 0, actual: Some(1), .. }
        ));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_header_fields() {
        let (service, _) = service();
        let order = order_a1().with_status(OrderStatus::Paid);
        service.create_order(&order).await.unwrap();

        let fetched = service.get_order_by_id(&order.order_id).await.unwrap();
        assert_eq!(fetched.order_id, order.order_id);
        assert_eq!(fetched.user_id, order.user_id);
        assert_eq!(fetched.order_data, order.order_data);
        assert_eq!(fetched.status, order.status);
        assert_eq!(fetched.order_version, INITIAL_ORDER_VERSION);
        assert!(fetched.id.is_some());
    }

    #[tokio::test]
    async fn test_versions_advance_by_exactly_one() {
        let (service, _) = service();
        service.create_order(&order_a1()).await.unwrap();

        for expected in 0..5 {
            let change = order_a1().with_status(if expected % 2 == 0 {
                OrderStatus::Paid
            } else {
                OrderStatus::Unpaid
            });
            service.update_order(&change, expected).await.unwrap();
            let stored = service.get_order_by_id(&change.order_id).await.unwrap();
            assert_eq!(stored.order_version, expected + 1);
        }
    }

    #[tokio::test]
    async fn test_zero_rows_is_normalized_to_conflict() {
        let (service, store) = service();
        service.create_order(&order_a1()).await.unwrap();
        store.arm(FailPoint::LoseUpdateRace);

        let err = service
            .update_order(&order_a1().with_status(OrderStatus::Paid), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::VersionConflict { expected: 0, actual: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_updates_have_one_winner() {
        let (service, _) = service();
        service.create_order(&order_a1()).await.unwrap();

        let paid = order_a1().with_status(OrderStatus::Paid);
        let cancelled = order_a1().with_status(OrderStatus::Cancelled);
        let (a, b) = tokio::join!(
            service.update_order(&paid, 0),
            service.update_order(&cancelled, 0)
        );

        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(OrderStoreError::VersionConflict { .. }))));

        let stored = service.get_order_by_id(&paid.order_id).await.unwrap();
        assert_eq!(stored.order_version, 1);
        let winner_status =
            if outcomes[0].is_ok() { OrderStatus::Paid } else { OrderStatus::Cancelled };
        assert_eq!(stored.status, winner_status);
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let (service, store) = service();

        let missing = OrderId::parse("nope").unwrap();
        assert!(matches!(
            service.get_order_by_id(&missing).await,
            Err(OrderStoreError::NotFound { .. })
        ));

        store.arm(FailPoint::BeforeCommit);
        assert!(matches!(
            service.create_order(&order_a1()).await,
            Err(OrderStoreError::Store { .. })
        ));
        assert_eq!(store.order_count(), 0);
    }
}
