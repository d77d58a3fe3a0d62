use actix_web::http::StatusCode;
use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

use super::limit::throttle;
use super::messages::*;
use crate::domain::order::{OrderId, OrderService, OrderStoreError};
use crate::metrics::Metrics;

// ============================================================================
// Order RPC Handlers
// ============================================================================
//
// Routes (all POST, JSON bodies):
// - /order/InsertOrder
// - /order/GetOrder
// - /order/UpdateOrder
// - /order/GenerateUUID
//
// Each call is counted and timed on the `Metrics` handle it is given. The
// scope is wrapped by the shared rate limiter when one is in app data.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Store(#[from] OrderStoreError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("insert order failed, rows affected is 0")]
    NoRowsAffected,

    #[error("request rate limit exceeded")]
    RateLimited,
}

impl RpcError {
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Store(err) => err.kind(),
            RpcError::BadRequest(_) => "bad_request",
            RpcError::NoRowsAffected => "no_rows_affected",
            RpcError::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_version: Option<i64>,
}

impl ResponseError for RpcError {
    fn status_code(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::NoRowsAffected => StatusCode::INTERNAL_SERVER_ERROR,
            RpcError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RpcError::Store(err) => match err {
                OrderStoreError::Decode { .. } => StatusCode::BAD_REQUEST,
                OrderStoreError::Constraint(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OrderStoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                OrderStoreError::VersionConflict { .. } => StatusCode::CONFLICT,
                OrderStoreError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (expected_version, actual_version) = match self {
            RpcError::Store(OrderStoreError::VersionConflict { expected, actual, .. }) => {
                (Some(*expected), *actual)
            }
            _ => (None, None),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.kind(),
            message: self.to_string(),
            expected_version,
            actual_version,
        })
    }
}

/// Register the order routes on an actix-web app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| RpcError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/order")
            .wrap(from_fn(throttle))
            .route("/InsertOrder", web::post().to(insert_order))
            .route("/GetOrder", web::post().to(get_order))
            .route("/UpdateOrder", web::post().to(update_order))
            .route("/GenerateUUID", web::post().to(generate_uuid)),
    );
}

async fn observed<T, F>(metrics: &Metrics, method: &'static str, call: F) -> Result<T, RpcError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    metrics.record_request(method);
    let started = Instant::now();

    let result = call.await;

    metrics.record_duration(method, started.elapsed());
    if let Err(err) = &result {
        metrics.record_error(method, err.kind());
        tracing::debug!(method, error = %err, "Order RPC failed");
    }
    result
}

async fn insert_order(
    service: web::Data<OrderService>,
    metrics: web::Data<Metrics>,
    request: web::Json<InsertRequest>,
) -> Result<web::Json<InsertResponse>, RpcError> {
    observed(&metrics, "InsertOrder", async {
        let order = request.into_inner().order_data.into_order()?;
        let rows_affected = service.create_order(&order).await?;
        if rows_affected == 0 {
            return Err(RpcError::NoRowsAffected);
        }
        Ok::<_, RpcError>(web::Json(InsertResponse {
            rows_affected: rows_to_wire(rows_affected),
        }))
    })
    .await
}

async fn get_order(
    service: web::Data<OrderService>,
    metrics: web::Data<Metrics>,
    request: web::Json<GetRequest>,
) -> Result<web::Json<GetResponse>, RpcError> {
    observed(&metrics, "GetOrder", async {
        let order_id = OrderId::parse(request.into_inner().order_id)?;
        let order = service.get_order_by_id(&order_id).await?;
        let items = service.list_order_items(&order_id).await?;
        Ok::<_, RpcError>(web::Json(GetResponse { order_data: order.into(), items }))
    })
    .await
}

async fn update_order(
    service: web::Data<OrderService>,
    metrics: web::Data<Metrics>,
    request: web::Json<UpdateRequest>,
) -> Result<web::Json<UpdateResponse>, RpcError> {
    observed(&metrics, "UpdateOrder", async {
        let UpdateRequest { order_data, old_version } = request.into_inner();
        let order = order_data.into_order()?;
        let rows_affected = service.update_order(&order, old_version).await?;
        Ok::<_, RpcError>(web::Json(UpdateResponse {
            rows_affected: rows_to_wire(rows_affected),
        }))
    })
    .await
}

async fn generate_uuid(
    metrics: web::Data<Metrics>,
    _request: web::Json<Empty>,
) -> Result<web::Json<GenerateUuidResponse>, RpcError> {
    observed(&metrics, "GenerateUUID", async {
        Ok::<_, RpcError>(web::Json(GenerateUuidResponse {
            uuid: OrderId::generate().to_string(),
        }))
    })
    .await
}

// ============================================================================
// Unit Tests
// ============================================================================
