//! Constants for TALLY API
//!
//! This module contains all constant values used throughout the API.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Prefix of the versioned REST routes
pub const API_PREFIX: &str = "/api/v1";

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Default interval between scheduled reconciliation sweeps (1 hour)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

/// Sweep interval used by `ReconcileJobConfig::development()`
pub const DEV_RECONCILE_INTERVAL_SECS: u64 = 60;
