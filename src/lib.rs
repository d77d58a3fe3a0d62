// ============================================================================
// Order Service
// ============================================================================
//
// Persists order aggregates (header + line items) in PostgreSQL and exposes
// create/read/update over an RPC boundary.
//
// Layers:
// - domain/  - order value objects, models, errors, aggregate service
// - store/   - OrderStore trait, PostgreSQL and in-memory implementations
// - rpc/     - request/response messages and actix-web handlers
// - metrics/ - Prometheus handle and exporter
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod metrics;
pub mod rpc;
pub mod store;
pub mod telemetry;
