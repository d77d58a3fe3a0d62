use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

use super::OrderStore;
use crate::domain::order::{
    ConstraintViolation, Order, OrderId, OrderItem, OrderStoreError, StoreOperation,
    INITIAL_ORDER_VERSION,
};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Test double for `PgOrderStore`. A write transaction works on a staged copy
// of the tables and swaps it in only on commit, so an error or a panic part
// way through leaves nothing behind. Fail points inject faults at the steps
// the atomicity property cares about.
//
// ============================================================================

/// Step at which the next matching operation fails. Each armed point fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Store error after the header insert, before any item insert.
    AfterHeaderInsert,
    /// Panic after the header insert.
    PanicAfterHeaderInsert,
    /// Store error from the commit step itself.
    BeforeCommit,
    /// The version check passes but a concurrent writer takes the row first,
    /// so the guarded write matches zero rows.
    LoseUpdateRace,
}

#[derive(Debug, thiserror::Error)]
#[error("injected fault at {0:?}")]
pub struct InjectedFault(pub FailPoint);

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: BTreeMap<String, Order>,
    items: Vec<OrderItem>,
    next_order_row: i64,
    next_item_row: i64,
}

impl Tables {
    fn insert_item(&mut self, mut item: OrderItem) {
        self.next_item_row += 1;
        item.id = Some(self.next_item_row);
        self.items.push(item);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<Tables>,
    armed: Mutex<HashSet<FailPoint>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, point: FailPoint) {
        self.armed.lock().insert(point);
    }

    pub fn order_count(&self) -> usize {
        self.tables.lock().orders.len()
    }

    pub fn item_count(&self) -> usize {
        self.tables.lock().items.len()
    }

    fn trip(&self, point: FailPoint) -> bool {
        self.armed.lock().remove(&point)
    }

    fn create_order_tx(&self, order: &Order) -> Result<u64, OrderStoreError> {
        let items = order.decode_items()?;

        let mut tables = self.tables.lock();
        let mut staged = tables.clone();

        if staged.orders.contains_key(order.order_id.as_str()) {
            return Err(OrderStoreError::Constraint(ConstraintViolation::DuplicateOrderId(
                order.order_id.clone(),
            )));
        }

        staged.next_order_row += 1;
        let header = Order {
            id: Some(staged.next_order_row),
            order_version: INITIAL_ORDER_VERSION,
            ..order.clone()
        };
        staged.orders.insert(order.order_id.as_str().to_owned(), header);

        if self.trip(FailPoint::AfterHeaderInsert) {
            return Err(OrderStoreError::store(
                StoreOperation::InsertOrderItem,
                InjectedFault(FailPoint::AfterHeaderInsert),
            ));
        }
        if self.trip(FailPoint::PanicAfterHeaderInsert) {
            panic!("injected panic after header insert for order {}", order.order_id);
        }

        for item in items {
            staged.insert_item(item);
        }

        if self.trip(FailPoint::BeforeCommit) {
            return Err(OrderStoreError::store(
                StoreOperation::CommitTransaction,
                InjectedFault(FailPoint::BeforeCommit),
            ));
        }

        *tables = staged;
        Ok(1)
    }

    fn update_order_tx(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<u64, OrderStoreError> {
        let mut tables = self.tables.lock();
        let stored = tables
            .orders
            .get_mut(order.order_id.as_str())
            .ok_or_else(|| OrderStoreError::NotFound { order_id: order.order_id.clone() })?;

        if stored.order_version != expected_version {
            return Err(OrderStoreError::VersionConflict {
                order_id: order.order_id.clone(),
                expected: expected_version,
                actual: Some(stored.order_version),
            });
        }

        if self.trip(FailPoint::LoseUpdateRace) {
            return Ok(0);
        }

        stored.order_data = order.order_data.clone();
        stored.status = order.status;
        stored.order_version += 1;
        Ok(1)
    }

    fn create_order_item_tx(&self, item: &OrderItem) -> Result<u64, OrderStoreError> {
        item.validate()?;

        let mut tables = self.tables.lock();
        if !tables.orders.contains_key(item.order_id.as_str()) {
            return Err(OrderStoreError::Constraint(ConstraintViolation::MissingOrder(
                item.order_id.clone(),
            )));
        }
        tables.insert_item(OrderItem { id: None, ..item.clone() });
        Ok(1)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &Order) -> Result<u64, OrderStoreError> {
        self.create_order_tx(order)
    }

    async fn update_order(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<u64, OrderStoreError> {
        self.update_order_tx(order, expected_version)
    }

    async fn get_order_by_id(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        self.tables
            .lock()
            .orders
            .get(order_id.as_str())
            .cloned()
            .ok_or_else(|| OrderStoreError::NotFound { order_id: order_id.clone() })
    }

    async fn create_order_item(&self, item: &OrderItem) -> Result<u64, OrderStoreError> {
        self.create_order_item_tx(item)
    }

    async fn list_order_items(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderItem>, OrderStoreError> {
        Ok(self
            .tables
            .lock()
            .items
            .iter()
            .filter(|item| &item.order_id == order_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use chrono::Utc;
    use std::sync::Arc;

    const TWO_ITEMS: &str = r#"[
        {"user_id": 7, "sku_id": 100, "count": 2, "timestamp": "2024-05-01T10:00:00Z"},
        {"user_id": 7, "sku_id": 101, "count": 1, "timestamp": "2024-05-01T10:00:00Z"}
    ]"#;

    fn order(key: &str) -> Order {
        Order::new(OrderId::parse(key).unwrap(), 7, TWO_ITEMS)
    }

    #[tokio::test]
    async fn test_create_inserts_header_and_items() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.create_order(&order("A1")).await.unwrap(), 1);

        let stored = store.get_order_by_id(&OrderId::parse("A1").unwrap()).await.unwrap();
        assert_eq!(stored.id, Some(1));
        assert_eq!(stored.order_version, INITIAL_ORDER_VERSION);

        let items = store.list_order_items(&stored.order_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, Some(1));
        assert_eq!(items[1].id, Some(2));
    }

    #[tokio::test]
    async fn test_create_forces_initial_version() {
        let store = InMemoryOrderStore::new();
        let mut o = order("A1");
        o.order_version = 42;
        store.create_order(&o).await.unwrap();

        let stored = store.get_order_by_id(&o.order_id).await.unwrap();
        assert_eq!(stored.order_version, INITIAL_ORDER_VERSION);
    }

    #[tokio::test]
    async fn test_failure_after_header_insert_leaves_nothing() {
        for point in [FailPoint::AfterHeaderInsert, FailPoint::BeforeCommit] {
            let store = InMemoryOrderStore::new();
            store.arm(point);

            let err = store.create_order(&order("A1")).await.unwrap_err();
            assert!(matches!(err, OrderStoreError::Store { .. }), "{point:?}: {err}");
            assert_eq!(store.order_count(), 0);
            assert_eq!(store.item_count(), 0);

            // Fail points are one-shot.
            store.create_order(&order("A1")).await.unwrap();
            assert_eq!(store.order_count(), 1);
            assert_eq!(store.item_count(), 2);
        }
    }

    #[tokio::test]
    async fn test_panic_mid_transaction_rolls_back() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.arm(FailPoint::PanicAfterHeaderInsert);

        let task_store = store.clone();
        let joined = tokio::spawn(async move { task_store.create_order(&order("A1")).await }).await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.item_count(), 0);

        // The lock is usable after the panic.
        store.create_order(&order("A1")).await.unwrap();
        assert_eq!(store.item_count(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_inserts_nothing() {
        let store = InMemoryOrderStore::new();
        let bad = Order::new(OrderId::parse("A1").unwrap(), 7, "[{\"sku_id\": ");

        let err = store.create_order(&bad).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::Decode { .. }));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_keeps_prior_data() {
        let store = InMemoryOrderStore::new();
        store.create_order(&order("A1")).await.unwrap();

        let mut dup = Order::new(OrderId::parse("A1").unwrap(), 8, "[]");
        dup.status = OrderStatus::Paid;
        let err = store.create_order(&dup).await.unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::Constraint(ConstraintViolation::DuplicateOrderId(_))
        ));

        let stored = store.get_order_by_id(&dup.order_id).await.unwrap();
        assert_eq!(stored.user_id, 7);
        assert_eq!(stored.status, OrderStatus::Unpaid);
        assert_eq!(store.item_count(), 2);
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let store = InMemoryOrderStore::new();
        store.create_order(&order("A1")).await.unwrap();

        let change = order("A1").with_status(OrderStatus::Paid);
        assert_eq!(store.update_order(&change, 0).await.unwrap(), 1);

        let stored = store.get_order_by_id(&change.order_id).await.unwrap();
        assert_eq!(stored.order_version, 1);
        assert_eq!(stored.status, OrderStatus::Paid);

        let err = store.update_order(&change, 0).await.unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::VersionConflict { expected: 0, actual: Some(1), .. }
        ));
        let unchanged = store.get_order_by_id(&change.order_id).await.unwrap();
        assert_eq!(unchanged.order_version, 1);
    }

    #[tokio::test]
    async fn test_update_never_rewrites_immutable_fields() {
        let store = InMemoryOrderStore::new();
        store.create_order(&order("A1")).await.unwrap();

        let mut change = order("A1");
        change.user_id = 99;
        change.order_data = "[]".into();
        store.update_order(&change, 0).await.unwrap();

        let stored = store.get_order_by_id(&change.order_id).await.unwrap();
        assert_eq!(stored.user_id, 7);
        assert_eq!(stored.order_data, "[]");
        // Items are not re-derived on update.
        assert_eq!(store.list_order_items(&change.order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let err = store.update_order(&order("missing"), 0).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lost_race_reports_zero_rows_without_writing() {
        let store = InMemoryOrderStore::new();
        store.create_order(&order("A1")).await.unwrap();
        store.arm(FailPoint::LoseUpdateRace);

        let change = order("A1").with_status(OrderStatus::Paid);
        assert_eq!(store.update_order(&change, 0).await.unwrap(), 0);

        let stored = store.get_order_by_id(&change.order_id).await.unwrap();
        assert_eq!(stored.order_version, 0);
        assert_eq!(stored.status, OrderStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_create_order_item_requires_existing_order() {
        let store = InMemoryOrderStore::new();
        let item = OrderItem {
            id: None,
            order_id: OrderId::parse("A1").unwrap(),
            user_id: 7,
            sku_id: 5,
            count: 3,
            timestamp: Utc::now(),
        };

        let err = store.create_order_item(&item).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::Constraint(ConstraintViolation::MissingOrder(_))));

        store.create_order(&Order::new(item.order_id.clone(), 7, "[]")).await.unwrap();
        assert_eq!(store.create_order_item(&item).await.unwrap(), 1);
        assert_eq!(store.list_order_items(&item.order_id).await.unwrap().len(), 1);

        let bad = OrderItem { count: 0, ..item };
        assert!(matches!(
            store.create_order_item(&bad).await.unwrap_err(),
            OrderStoreError::Constraint(ConstraintViolation::NonPositiveCount { .. })
        ));
    }
}
