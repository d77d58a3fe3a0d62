// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::time::Duration;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order RPC surface
// ============================================================================
//
// One `Metrics` value is created in main and handed to the RPC layer. Every
// metric carries the service/version/os labels the deployment dashboards
// group by, plus the RPC method.
//
// ============================================================================

/// Constant labels identifying this service instance.
#[derive(Debug, Clone)]
pub struct ServiceLabels {
    pub service: String,
    pub version: String,
    pub os: String,
}

impl Default for ServiceLabels {
    fn default() -> Self {
        Self {
            service: "order".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

pub struct Metrics {
    registry: Registry,
    labels: ServiceLabels,

    pub requests_total: IntCounterVec,
    pub response_seconds: HistogramVec,
    pub errors_total: IntCounterVec,
}

impl Metrics {
    pub fn new(labels: ServiceLabels) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("order_rpc_requests_total", "Total order RPC requests received"),
            &["service", "version", "os", "method"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let response_seconds = HistogramVec::new(
            HistogramOpts::new("order_rpc_response_seconds", "Order RPC handling duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["service", "version", "os", "method"],
        )?;
        registry.register(Box::new(response_seconds.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("order_rpc_errors_total", "Order RPC requests that returned an error"),
            &["method", "kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            registry,
            labels,
            requests_total,
            response_seconds,
            errors_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn label_values<'a>(&'a self, method: &'a str) -> [&'a str; 4] {
        [
            self.labels.service.as_str(),
            self.labels.version.as_str(),
            self.labels.os.as_str(),
            method,
        ]
    }

    pub fn record_request(&self, method: &str) {
        self.requests_total.with_label_values(&self.label_values(method)).inc();
    }

    pub fn record_duration(&self, method: &str, elapsed: Duration) {
        self.response_seconds
            .with_label_values(&self.label_values(method))
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, method: &str, kind: &str) {
        self.errors_total.with_label_values(&[method, kind]).inc();
    }
}
