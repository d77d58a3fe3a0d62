// ============================================================================
// RPC Surface - Order Protocol over actix-web
// ============================================================================

mod handler;
mod limit;
pub mod messages;

pub use handler::{configure, RpcError};
pub use limit::RpcRateLimiter;
