use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use order_service::config::AppConfig;
use order_service::domain::order::OrderService;
use order_service::metrics::{self, Metrics, ServiceLabels};
use order_service::rpc::{self, RpcRateLimiter};
use order_service::store::{ensure_schema, PgOrderStore};
use order_service::telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    telemetry::init_tracing();

    tracing::info!("🚀 Starting order service");

    // === 1. Configuration ===
    let config = AppConfig::from_env()?;

    // === 2. Connection pool + table bootstrap ===
    tracing::info!(
        max_connections = config.pool.max_connections,
        "Connecting to PostgreSQL..."
    );
    let store = PgOrderStore::connect(&config.database_url, &config.pool).await?;

    if config.bootstrap_schema {
        ensure_schema(store.pool()).await?;
    }

    // === 3. Metrics handle, shared with the RPC layer ===
    let metrics = web::Data::new(Metrics::new(ServiceLabels::default())?);
    let registry = Arc::new(metrics.registry().clone());

    // === 4. Aggregate service over the store ===
    let service = web::Data::new(OrderService::new(Arc::new(store)));

    // === 5. One rate limiter shared by every worker ===
    let limiter = web::Data::new(RpcRateLimiter::per_second(config.rpc_qps));

    tracing::info!(addr = %config.rpc_addr, qps = config.rpc_qps.get(), "📡 Serving order RPC");
    let rpc_server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(metrics.clone())
            .app_data(limiter.clone())
            .configure(rpc::configure)
    })
    .bind(config.rpc_addr)?
    .run();

    futures_util::future::try_join(
        rpc_server,
        metrics::start_metrics_server(registry, config.metrics_port),
    )
    .await?;

    tracing::info!("Order service stopped");
    Ok(())
}
