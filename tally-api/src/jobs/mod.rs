//! Background Jobs for TALLY API
//!
//! - `reconcile_sweep`: Periodically reconciles every tenant's counters
//!
//! # Usage
//!
//! ```ignore
//! use tally_api::jobs::{reconcile_sweep_task, ReconcileJobConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let config = ReconcileJobConfig::from_env();
//! tokio::spawn(reconcile_sweep_task(state.store.clone(), state.policy.clone(), config, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod reconcile_sweep;

pub use reconcile_sweep::{
    reconcile_sweep_task, ReconcileJobConfig, ReconcileSweepMetrics, ReconcileSweepSnapshot,
};
