//! TALLY API - HTTP Trigger Surface for Usage Counters
//!
//! Exposes the counter hooks, tenant reconciliation and drift reports over
//! REST (Axum), runs the scheduled reconciliation sweep, and provides the
//! PostgreSQL-backed `CounterStore`.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, StoreBackend};
pub use db::{DbClient, DbConfig, SCHEMA_SQL};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{reconcile_sweep_task, ReconcileJobConfig, ReconcileSweepMetrics};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::{AppState, SharedStore};
pub use telemetry::{init_tracing, TelemetryConfig};
