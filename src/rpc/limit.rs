use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use super::handler::RpcError;
use crate::metrics::Metrics;

// ============================================================================
// RPC Rate Limit
// ============================================================================
//
// One token bucket shared by every `/order` route and every worker. Requests
// that find it empty are answered 429 without reaching a handler.
//
// ============================================================================

pub struct RpcRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl RpcRateLimiter {
    /// Refill at `qps` tokens per second, burst of `qps`.
    pub fn per_second(qps: NonZeroU32) -> Self {
        Self { limiter: RateLimiter::direct(Quota::per_second(qps)) }
    }

    fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Middleware for `from_fn`. Without an `RpcRateLimiter` in app data every
/// request passes.
pub(super) async fn throttle<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    let admitted = req
        .app_data::<web::Data<RpcRateLimiter>>()
        .map_or(true, |limiter| limiter.try_acquire());

    if !admitted {
        if let Some(metrics) = req.app_data::<web::Data<Metrics>>() {
            metrics.record_error("rpc", RpcError::RateLimited.kind());
        }
        tracing::debug!(path = req.path(), "Order RPC rate limited");
        return Ok(req.error_response(RpcError::RateLimited));
    }

    Ok(next.call(req).await?.map_into_boxed_body())
}
