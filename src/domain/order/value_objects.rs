use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{ConstraintViolation, OrderStoreError};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Version every order header starts at when it is first persisted.
pub const INITIAL_ORDER_VERSION: i64 = 0;

/// Business key of an order.
///
/// Callers usually obtain one from `GenerateUUID` before creating the order.
/// The key is immutable once the header row exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, OrderStoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(OrderStoreError::Constraint(ConstraintViolation::EmptyOrderId));
        }
        Ok(Self(raw))
    }

    /// Fresh key for a new order.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderId {
    type Error = OrderStoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment state of an order, stored as a SMALLINT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum OrderStatus {
    #[default]
    Unpaid,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            OrderStatus::Unpaid => 0,
            OrderStatus::Paid => 1,
            OrderStatus::Cancelled => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub i16);

impl TryFrom<i16> for OrderStatus {
    type Error = UnknownOrderStatus;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OrderStatus::Unpaid),
            1 => Ok(OrderStatus::Paid),
            2 => Ok(OrderStatus::Cancelled),
            other => Err(UnknownOrderStatus(other)),
        }
    }
}

impl From<OrderStatus> for i16 {
    fn from(status: OrderStatus) -> Self {
        status.as_i16()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
