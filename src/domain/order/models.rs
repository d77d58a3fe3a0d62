use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ConstraintViolation, OrderStoreError};
use super::value_objects::{OrderId, OrderStatus, INITIAL_ORDER_VERSION};

// ============================================================================
// Order Aggregate Rows
// ============================================================================
//
// `Order` is the header row, `OrderItem` a denormalized line-item row.
// `order_data` is the JSON array the items are derived from at creation time;
// after creation the two are independent.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Surrogate row id, assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub order_id: OrderId,
    pub order_version: i64,
    pub user_id: i64,
    pub order_data: String,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(order_id: OrderId, user_id: i64, order_data: impl Into<String>) -> Self {
        Self {
            id: None,
            order_id,
            order_version: INITIAL_ORDER_VERSION,
            user_id,
            order_data: order_data.into(),
            status: OrderStatus::Unpaid,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Decode `order_data` into item rows owned by this order.
    pub fn decode_items(&self) -> Result<Vec<OrderItem>, OrderStoreError> {
        decode_order_data(&self.order_id, &self.order_data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub order_id: OrderId,
    pub user_id: i64,
    pub sku_id: i64,
    pub count: i32,
    pub timestamp: DateTime<Utc>,
}

impl OrderItem {
    /// Rejects a non-positive quantity before it reaches the store.
    pub fn validate(&self) -> Result<(), OrderStoreError> {
        if self.count <= 0 {
            return Err(OrderStoreError::Constraint(
                ConstraintViolation::NonPositiveCount { index: None, count: self.count },
            ));
        }
        Ok(())
    }
}

/// One element of the `order_data` array as the caller sent it.
///
/// Every field is optional at the JSON level so that a missing field can be
/// reported as a constraint violation instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemPayload {
    pub order_id: Option<String>,
    pub user_id: Option<i64>,
    pub sku_id: Option<i64>,
    pub count: Option<i32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl LineItemPayload {
    fn into_item(self, index: usize, owner: &OrderId) -> Result<OrderItem, OrderStoreError> {
        let missing = |field| {
            OrderStoreError::Constraint(ConstraintViolation::MissingItemField { index, field })
        };

        if let Some(found) = self.order_id {
            if found != owner.as_str() {
                return Err(OrderStoreError::Constraint(ConstraintViolation::ItemOrderMismatch {
                    index,
                    expected: owner.clone(),
                    found,
                }));
            }
        }

        let count = self.count.ok_or_else(|| missing("count"))?;
        if count <= 0 {
            return Err(OrderStoreError::Constraint(ConstraintViolation::NonPositiveCount {
                index: Some(index),
                count,
            }));
        }

        Ok(OrderItem {
            id: None,
            order_id: owner.clone(),
            user_id: self.user_id.ok_or_else(|| missing("user_id"))?,
            sku_id: self.sku_id.ok_or_else(|| missing("sku_id"))?,
            count,
            timestamp: self.timestamp.ok_or_else(|| missing("timestamp"))?,
        })
    }
}

/// Decode an `order_data` payload into item rows for `owner`.
pub fn decode_order_data(
    owner: &OrderId,
    order_data: &str,
) -> Result<Vec<OrderItem>, OrderStoreError> {
    let payloads: Vec<LineItemPayload> =
        serde_json::from_str(order_data).map_err(|e| OrderStoreError::Decode {
            order_id: owner.clone(),
            reason: e.to_string(),
        })?;

    payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| payload.into_item(index, owner))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================
