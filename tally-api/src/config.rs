//! API Configuration Module
//!
//! Server settings loaded from environment variables with sensible defaults
//! for development.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{ApiError, ApiResult};

/// Which store implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through the connection pool.
    Postgres,
    /// Process-local in-memory store. Data is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(ApiError::invalid_input(format!(
                "Unknown store backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgres => write!(f, "postgres"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Store backend.
    pub store: StoreBackend,

    /// Upper bound for a whole health or docs request.
    pub request_timeout: Duration,

    /// Apply the schema on startup (postgres only).
    pub migrate_on_start: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            store: StoreBackend::Postgres,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            migrate_on_start: false,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TALLY_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` or `TALLY_API_PORT`: Port to listen on (default: 3000)
    /// - `TALLY_STORE`: "postgres" or "memory" (default: postgres)
    /// - `TALLY_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
    /// - `TALLY_DB_MIGRATE`: "true" applies the schema on startup (default: false)
    pub fn from_env() -> ApiResult<Self> {
        let bind_host =
            std::env::var("TALLY_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("TALLY_API_PORT").ok())
        {
            Some(port_str) => port_str.parse::<u16>().map_err(|_| {
                ApiError::invalid_input(format!("Invalid port value: {}", port_str))
            })?,
            None => DEFAULT_PORT,
        };

        let store = match std::env::var("TALLY_STORE") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Postgres,
        };

        let request_timeout = Duration::from_secs(
            std::env::var("TALLY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );

        let migrate_on_start = std::env::var("TALLY_DB_MIGRATE")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            bind_host,
            port,
            store,
            request_timeout,
            migrate_on_start,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}
