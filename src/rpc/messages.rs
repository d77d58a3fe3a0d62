use serde::{Deserialize, Serialize};

use crate::domain::order::{
    Order, OrderId, OrderItem, OrderStatus, OrderStoreError, INITIAL_ORDER_VERSION,
};

// ============================================================================
// RPC Messages
// ============================================================================
//
// Typed request/response bodies of the order protocol. Field names follow
// the wire protocol (snake_case JSON).
//
// ============================================================================

/// Order header as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub order_id: String,
    #[serde(default)]
    pub order_version: i64,
    pub user_id: i64,
    pub order_data: String,
    #[serde(default)]
    pub status: OrderStatus,
}

impl OrderInfo {
    pub fn into_order(self) -> Result<Order, OrderStoreError> {
        Ok(Order {
            id: None,
            order_id: OrderId::parse(self.order_id)?,
            order_version: self.order_version,
            user_id: self.user_id,
            order_data: self.order_data,
            status: self.status,
        })
    }
}

impl From<Order> for OrderInfo {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id.as_str().to_owned(),
            order_version: order.order_version,
            user_id: order.user_id,
            order_data: order.order_data,
            status: order.status,
        }
    }
}

impl Default for OrderInfo {
    fn default() -> Self {
        Self {
            order_id: String::new(),
            order_version: INITIAL_ORDER_VERSION,
            user_id: 0,
            order_data: "[]".to_string(),
            status: OrderStatus::Unpaid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    pub order_data: OrderInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertResponse {
    pub rows_affected: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub order_data: OrderInfo,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub order_data: OrderInfo,
    /// Version the caller last observed.
    pub old_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub rows_affected: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateUuidResponse {
    pub uuid: String,
}

/// Saturating conversion for the protocol's 32-bit row counts.
pub fn rows_to_wire(rows_affected: u64) -> i32 {
    i32::try_from(rows_affected).unwrap_or(i32::MAX)
}
