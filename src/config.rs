use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::store::PoolConfig;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from the process environment, after loading `.env` when present.
// `from_lookup` takes the lookup as a closure so tests never touch the real
// environment.
//
// ============================================================================

pub const ENV_DATABASE_URL: &str = "ORDER_DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "ORDER_DB_MAX_CONNECTIONS";
pub const ENV_DB_ACQUIRE_TIMEOUT_SECS: &str = "ORDER_DB_ACQUIRE_TIMEOUT_SECS";
pub const ENV_RPC_ADDR: &str = "ORDER_RPC_ADDR";
pub const ENV_METRICS_PORT: &str = "ORDER_METRICS_PORT";
pub const ENV_BOOTSTRAP_SCHEMA: &str = "ORDER_BOOTSTRAP_SCHEMA";
pub const ENV_RPC_QPS: &str = "ORDER_RPC_QPS";

const DEFAULT_RPC_QPS: u32 = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {key}")]
    Missing { key: &'static str },

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub pool: PoolConfig,
    pub rpc_addr: SocketAddr,
    pub metrics_port: u16,
    pub bootstrap_schema: bool,
    /// Requests per second admitted across all RPC routes.
    pub rpc_qps: NonZeroU32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { key: ENV_DATABASE_URL })?;

        let max_connections: u32 = parse_or(&lookup, ENV_DB_MAX_CONNECTIONS, 10)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_DB_MAX_CONNECTIONS,
                value: max_connections.to_string(),
            });
        }
        let acquire_timeout_secs: u64 = parse_or(&lookup, ENV_DB_ACQUIRE_TIMEOUT_SECS, 30)?;

        Ok(Self {
            database_url,
            pool: PoolConfig {
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            },
            rpc_addr: parse_or(&lookup, ENV_RPC_ADDR, SocketAddr::from(([127, 0, 0, 1], 8084)))?,
            metrics_port: parse_or(&lookup, ENV_METRICS_PORT, 9090)?,
            bootstrap_schema: parse_or(&lookup, ENV_BOOTSTRAP_SCHEMA, true)?,
            rpc_qps: parse_or(
                &lookup,
                ENV_RPC_QPS,
                NonZeroU32::new(DEFAULT_RPC_QPS).unwrap_or(NonZeroU32::MIN),
            )?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
