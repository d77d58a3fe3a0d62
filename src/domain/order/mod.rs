// ============================================================================
// Order Domain - Order Aggregate Write Path
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderId, OrderStatus)
// - Models (Order header, OrderItem rows, order_data decoding)
// - Errors (OrderStoreError taxonomy)
// - Service (OrderService, the aggregate service over an OrderStore)
//
// Persistence lives in `crate::store`.
//
// ============================================================================

pub mod value_objects;
pub mod models;
pub mod errors;
pub mod service;

// Re-export for convenience
pub use value_objects::*;
pub use models::*;
pub use errors::*;
pub use service::*;
