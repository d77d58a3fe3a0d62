use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::schema::{ORDER_ID_UNIQUE, ORDER_ITEM_ORDER_FK};
use super::OrderStore;
use crate::domain::order::{
    ConstraintViolation, Order, OrderId, OrderItem, OrderStatus, OrderStoreError, StoreOperation,
    INITIAL_ORDER_VERSION,
};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Every operation acquires one pooled connection for its duration.
// - create_order: header insert, then item inserts, one transaction
// - update_order: SELECT ... FOR UPDATE, compare, guarded UPDATE, one
//   transaction. The `AND order_version = $n` guard on the UPDATE closes the
//   window even if the row lock is ever weakened.
//
// A transaction dropped without commit (error or panic) is rolled back by
// sqlx before the connection returns to the pool.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, OrderStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| OrderStoreError::store(StoreOperation::Connect, e))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(
        &self,
        order_id: &OrderId,
    ) -> Result<Transaction<'static, Postgres>, OrderStoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, StoreOperation::BeginTransaction, order_id))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(
        name = "order_store.create_order",
        skip(self, order),
        fields(order_id = %order.order_id)
    )]
    async fn create_order(&self, order: &Order) -> Result<u64, OrderStoreError> {
        let items = order.decode_items()?;

        let mut tx = self.begin(&order.order_id).await?;
        let outcome = insert_aggregate(&mut tx, order, &items).await;
        let rows_affected = finish(tx, outcome, &order.order_id).await?;

        info!(
            order_id = %order.order_id,
            item_count = items.len(),
            rows_affected,
            "✅ Created order with its items"
        );
        Ok(rows_affected)
    }

    #[instrument(
        name = "order_store.update_order",
        skip(self, order),
        fields(order_id = %order.order_id)
    )]
    async fn update_order(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<u64, OrderStoreError> {
        let mut tx = self.begin(&order.order_id).await?;
        let outcome = compare_and_swap(&mut tx, order, expected_version).await;
        let rows_affected = finish(tx, outcome, &order.order_id).await?;

        info!(
            order_id = %order.order_id,
            new_version = expected_version + 1,
            "✅ Updated order"
        );
        Ok(rows_affected)
    }

    #[instrument(name = "order_store.get_order_by_id", skip(self))]
    async fn get_order_by_id(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, order_version, user_id, order_data, status
            FROM "order"
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, StoreOperation::FetchOrder, order_id))?;

        match row {
            Some(row) => order_from_row(&row, order_id),
            None => Err(OrderStoreError::NotFound { order_id: order_id.clone() }),
        }
    }

    #[instrument(
        name = "order_store.create_order_item",
        skip(self, item),
        fields(order_id = %item.order_id)
    )]
    async fn create_order_item(&self, item: &OrderItem) -> Result<u64, OrderStoreError> {
        item.validate()?;

        let result = insert_item_query(item)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, StoreOperation::InsertOrderItem, &item.order_id))?;

        Ok(result.rows_affected())
    }

    #[instrument(name = "order_store.list_order_items", skip(self))]
    async fn list_order_items(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderItem>, OrderStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, user_id, sku_id, count, "timestamp"
            FROM order_item
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, StoreOperation::FetchOrderItems, order_id))?;

        rows.iter().map(|row| item_from_row(row, order_id)).collect()
    }
}

// ============================================================================
// Transaction Bodies
// ============================================================================

async fn insert_aggregate(
    tx: &mut Transaction<'static, Postgres>,
    order: &Order,
    items: &[OrderItem],
) -> Result<u64, OrderStoreError> {
    let header = sqlx::query(
        r#"
        INSERT INTO "order" (order_id, order_version, user_id, order_data, status)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(INITIAL_ORDER_VERSION)
    .bind(order.user_id)
    .bind(order.order_data.as_str())
    .bind(order.status.as_i16())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(e, StoreOperation::InsertOrder, &order.order_id))?;

    // Items reference the header by foreign key, so they go in after it.
    for item in items {
        insert_item_query(item)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(e, StoreOperation::InsertOrderItem, &order.order_id))?;
    }

    Ok(header.rows_affected())
}

async fn compare_and_swap(
    tx: &mut Transaction<'static, Postgres>,
    order: &Order,
    expected_version: i64,
) -> Result<u64, OrderStoreError> {
    let row = sqlx::query(r#"SELECT order_version FROM "order" WHERE order_id = $1 FOR UPDATE"#)
        .bind(order.order_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(e, StoreOperation::FetchOrder, &order.order_id))?;

    let Some(row) = row else {
        return Err(OrderStoreError::NotFound { order_id: order.order_id.clone() });
    };
    let actual: i64 = row
        .try_get("order_version")
        .map_err(|e| map_sqlx_error(e, StoreOperation::FetchOrder, &order.order_id))?;

    if actual != expected_version {
        warn!(
            order_id = %order.order_id,
            expected_version,
            actual_version = actual,
            "Rejected stale order update"
        );
        return Err(OrderStoreError::VersionConflict {
            order_id: order.order_id.clone(),
            expected: expected_version,
            actual: Some(actual),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE "order"
        SET order_data = $1,
            status = $2,
            order_version = order_version + 1
        WHERE order_id = $3 AND order_version = $4
        "#,
    )
    .bind(order.order_data.as_str())
    .bind(order.status.as_i16())
    .bind(order.order_id.as_str())
    .bind(expected_version)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(e, StoreOperation::UpdateOrder, &order.order_id))?;

    if result.rows_affected() == 0 {
        warn!(order_id = %order.order_id, expected_version, "Guarded update matched no rows");
        return Err(OrderStoreError::VersionConflict {
            order_id: order.order_id.clone(),
            expected: expected_version,
            actual: None,
        });
    }

    Ok(result.rows_affected())
}

/// Commit on success, roll back on failure. A failed commit is surfaced.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    outcome: Result<T, OrderStoreError>,
    order_id: &OrderId,
) -> Result<T, OrderStoreError> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(e, StoreOperation::CommitTransaction, order_id))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    order_id = %order_id,
                    error = %rollback_err,
                    "Rollback failed, connection will be discarded"
                );
            }
            Err(err)
        }
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn insert_item_query(
    item: &OrderItem,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO order_item (order_id, user_id, sku_id, count, "timestamp")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(item.order_id.as_str())
    .bind(item.user_id)
    .bind(item.sku_id)
    .bind(item.count)
    .bind(item.timestamp)
}

fn order_from_row(row: &PgRow, order_id: &OrderId) -> Result<Order, OrderStoreError> {
    let fetch = |e| map_sqlx_error(e, StoreOperation::FetchOrder, order_id);
    let decode = |reason: String| OrderStoreError::Decode { order_id: order_id.clone(), reason };

    let raw_status: i16 = row.try_get("status").map_err(fetch)?;
    let raw_order_id: String = row.try_get("order_id").map_err(fetch)?;

    Ok(Order {
        id: Some(row.try_get("id").map_err(fetch)?),
        order_id: OrderId::parse(raw_order_id).map_err(|e| decode(e.to_string()))?,
        order_version: row.try_get("order_version").map_err(fetch)?,
        user_id: row.try_get("user_id").map_err(fetch)?,
        order_data: row.try_get("order_data").map_err(fetch)?,
        status: OrderStatus::try_from(raw_status).map_err(|e| decode(e.to_string()))?,
    })
}

fn item_from_row(row: &PgRow, order_id: &OrderId) -> Result<OrderItem, OrderStoreError> {
    let fetch = |e| map_sqlx_error(e, StoreOperation::FetchOrderItems, order_id);

    Ok(OrderItem {
        id: Some(row.try_get("id").map_err(fetch)?),
        order_id: order_id.clone(),
        user_id: row.try_get("user_id").map_err(fetch)?,
        sku_id: row.try_get("sku_id").map_err(fetch)?,
        count: row.try_get("count").map_err(fetch)?,
        timestamp: row.try_get("timestamp").map_err(fetch)?,
    })
}

// ============================================================================
// Error Translation
// ============================================================================

fn map_sqlx_error(
    error: sqlx::Error,
    operation: StoreOperation,
    order_id: &OrderId,
) -> OrderStoreError {
    if let Some(violation) = constraint_violation(&error, order_id) {
        warn!(
            order_id = %order_id,
            operation = %operation,
            violation = %violation,
            "Constraint violated"
        );
        return OrderStoreError::Constraint(violation);
    }

    error!(
        order_id = %order_id,
        operation = %operation,
        error = %error,
        "Order store operation failed"
    );
    OrderStoreError::store(operation, error)
}

/// SQLSTATE class 23 (integrity constraint violation) codes we translate.
fn constraint_violation(error: &sqlx::Error, order_id: &OrderId) -> Option<ConstraintViolation> {
    let sqlx::Error::Database(db_error) = error else {
        return None;
    };
    let code = db_error.code()?.into_owned();
    let constraint = db_error.constraint();

    let violation = match (code.as_str(), constraint) {
        ("23505", Some(ORDER_ID_UNIQUE)) => ConstraintViolation::DuplicateOrderId(order_id.clone()),
        ("23503", Some(ORDER_ITEM_ORDER_FK)) => ConstraintViolation::MissingOrder(order_id.clone()),
        ("23502" | "23503" | "23505" | "23514", _) => ConstraintViolation::Database {
            constraint: constraint.map(str::to_owned),
            code,
        },
        _ => return None,
    };
    Some(violation)
}
