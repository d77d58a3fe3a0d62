use std::fmt;

use super::value_objects::OrderId;

// ============================================================================
// Order Store Errors
// ============================================================================
//
// Closed taxonomy shared by every store implementation and the aggregate
// service. Nothing in the write path retries on any of these.
//
// ============================================================================

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum OrderStoreError {
    #[error("cannot decode order data for order {order_id}: {reason}")]
    Decode { order_id: OrderId, reason: String },

    #[error("constraint violated: {0}")]
    Constraint(ConstraintViolation),

    #[error("order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error(
        "version conflict on order {order_id}: expected {expected}, found {}",
        DisplayVersion(.actual)
    )]
    VersionConflict {
        order_id: OrderId,
        expected: i64,
        /// `None` when a concurrent writer won between the check and the write.
        actual: Option<i64>,
    },

    #[error("store failure during {operation}")]
    Store {
        operation: StoreOperation,
        #[source]
        source: BoxError,
    },
}

impl OrderStoreError {
    pub fn store(operation: StoreOperation, source: impl Into<BoxError>) -> Self {
        OrderStoreError::Store {
            operation,
            source: source.into(),
        }
    }

    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderStoreError::Decode { .. } => "decode_error",
            OrderStoreError::Constraint(_) => "constraint_violation",
            OrderStoreError::NotFound { .. } => "not_found",
            OrderStoreError::VersionConflict { .. } => "version_conflict",
            OrderStoreError::Store { .. } => "store_unavailable",
        }
    }
}

struct DisplayVersion<'a>(&'a Option<i64>);

impl fmt::Display for DisplayVersion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("a newer version"),
        }
    }
}

/// What uniqueness, referential or not-null rule was broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    EmptyOrderId,
    DuplicateOrderId(OrderId),
    MissingOrder(OrderId),
    MissingItemField { index: usize, field: &'static str },
    NonPositiveCount { index: Option<usize>, count: i32 },
    ItemOrderMismatch { index: usize, expected: OrderId, found: String },
    /// Reported by the database without a more specific mapping.
    Database { constraint: Option<String>, code: String },
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintViolation::EmptyOrderId => f.write_str("order id must not be empty"),
            ConstraintViolation::DuplicateOrderId(id) => write!(f, "order {id} already exists"),
            ConstraintViolation::MissingOrder(id) => write!(f, "order {id} does not exist"),
            ConstraintViolation::MissingItemField { index, field } => {
                write!(f, "item {index} is missing required field `{field}`")
            }
            ConstraintViolation::NonPositiveCount { index: Some(index), count } => {
                write!(f, "item {index} has non-positive count {count}")
            }
            ConstraintViolation::NonPositiveCount { index: None, count } => {
                write!(f, "item has non-positive count {count}")
            }
            ConstraintViolation::ItemOrderMismatch { index, expected, found } => {
                write!(f, "item {index} references order {found}, expected {expected}")
            }
            ConstraintViolation::Database { constraint: Some(name), code } => {
                write!(f, "database constraint {name} ({code})")
            }
            ConstraintViolation::Database { constraint: None, code } => {
                write!(f, "database constraint ({code})")
            }
        }
    }
}

/// Step of a store operation, reported with `OrderStoreError::Store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Connect,
    BeginTransaction,
    InsertOrder,
    InsertOrderItem,
    FetchOrder,
    FetchOrderItems,
    UpdateOrder,
    CommitTransaction,
    Bootstrap,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::Connect => "connect",
            StoreOperation::BeginTransaction => "begin_transaction",
            StoreOperation::InsertOrder => "insert_order",
            StoreOperation::InsertOrderItem => "insert_order_item",
            StoreOperation::FetchOrder => "fetch_order",
            StoreOperation::FetchOrderItems => "fetch_order_items",
            StoreOperation::UpdateOrder => "update_order",
            StoreOperation::CommitTransaction => "commit_transaction",
            StoreOperation::Bootstrap => "bootstrap",
        };
        f.write_str(name)
    }
}
