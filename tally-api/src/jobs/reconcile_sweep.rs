//! Scheduled Reconciliation Sweep
//!
//! Periodically reconciles every tenant so that counters left stale by a
//! failed hook, a crash between the order write and the counter write, or a
//! direct database edit converge without operator action.
//!
//! # Configuration
//!
//! ```rust
//! use tally_api::jobs::ReconcileJobConfig;
//! use std::time::Duration;
//!
//! let config = ReconcileJobConfig {
//!     enabled: true,
//!     interval: Duration::from_secs(3600), // Sweep hourly
//!     log_updates: false,                  // Only log per-cycle summaries
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_core::CounterPolicy;
use tally_counters::{reconcile_all, BatchReconcileReport, ItemStatus};
use tally_storage::CounterStore;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::constants::{DEFAULT_RECONCILE_INTERVAL_SECS, DEV_RECONCILE_INTERVAL_SECS};
use crate::state::SharedStore;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the reconciliation sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJobConfig {
    /// Whether the sweep is spawned at all (default: true)
    pub enabled: bool,

    /// Time between sweeps (default: 1 hour)
    pub interval: Duration,

    /// Log every corrected counter, not only the cycle summary (default: false)
    pub log_updates: bool,
}

impl Default for ReconcileJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            log_updates: false,
        }
    }
}

impl ReconcileJobConfig {
    /// Create ReconcileJobConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TALLY_RECONCILE_ENABLED`: "false" disables the sweep (default: true)
    /// - `TALLY_RECONCILE_INTERVAL_SECS`: Seconds between sweeps (default: 3600)
    /// - `TALLY_RECONCILE_LOG_UPDATES`: "true" logs each corrected counter (default: false)
    pub fn from_env() -> Self {
        let enabled = std::env::var("TALLY_RECONCILE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        // A zero interval would panic in tokio::time::interval.
        let interval = Duration::from_secs(
            std::env::var("TALLY_RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
        );

        let log_updates = std::env::var("TALLY_RECONCILE_LOG_UPDATES")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            enabled,
            interval,
            log_updates,
        }
    }

    /// Short interval with per-counter logging, for local development.
    pub fn development() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEV_RECONCILE_INTERVAL_SECS),
            log_updates: true,
        }
    }

    /// Hourly sweep, summaries only.
    pub fn production() -> Self {
        Self::default()
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters describing the sweep's activity since startup.
#[derive(Debug, Default)]
pub struct ReconcileSweepMetrics {
    /// Sweeps started
    pub runs: AtomicU64,

    /// Counters rewritten to their recomputed value
    pub counters_updated: AtomicU64,

    /// Counter writes that failed
    pub counters_failed: AtomicU64,

    /// Tenants whose catalog or orders could not be read
    pub tenant_failures: AtomicU64,

    /// Sweeps that could not list tenants at all
    pub errors: AtomicU64,
}

impl ReconcileSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, batch: &BatchReconcileReport) {
        self.counters_updated
            .fetch_add(batch.counters_updated as u64, Ordering::Relaxed);
        self.counters_failed
            .fetch_add(batch.counters_failed as u64, Ordering::Relaxed);
        self.tenant_failures
            .fetch_add(batch.failures.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconcileSweepSnapshot {
        ReconcileSweepSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            counters_updated: self.counters_updated.load(Ordering::Relaxed),
            counters_failed: self.counters_failed.load(Ordering::Relaxed),
            tenant_failures: self.tenant_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ReconcileSweepMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSweepSnapshot {
    pub runs: u64,
    pub counters_updated: u64,
    pub counters_failed: u64,
    pub tenant_failures: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Reconcile every tenant on each tick until `shutdown_rx` flips to `true`.
///
/// The first sweep runs immediately. Ticks missed while a sweep is still
/// running are skipped rather than queued.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(reconcile_sweep_task(
///     state.store.clone(),
///     state.policy.clone(),
///     ReconcileJobConfig::from_env(),
///     shutdown_rx,
/// ));
///
/// // On shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn reconcile_sweep_task(
    store: SharedStore,
    policy: CounterPolicy,
    config: ReconcileJobConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ReconcileSweepMetrics> {
    let metrics = Arc::new(ReconcileSweepMetrics::new());

    let mut sweep_interval = interval(config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        log_updates = config.log_updates,
        "Reconciliation sweep started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Reconciliation sweep shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                run_sweep(&*store, &policy, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        counters_updated = snapshot.counters_updated,
        counters_failed = snapshot.counters_failed,
        tenant_failures = snapshot.tenant_failures,
        errors = snapshot.errors,
        "Reconciliation sweep completed"
    );

    metrics
}

/// One sweep over every tenant.
async fn run_sweep(
    store: &dyn CounterStore,
    policy: &CounterPolicy,
    config: &ReconcileJobConfig,
    metrics: &ReconcileSweepMetrics,
) {
    metrics.runs.fetch_add(1, Ordering::Relaxed);

    let batch = match reconcile_all(store, policy).await {
        Ok(batch) => batch,
        Err(e) => {
            tracing::error!(error = %e, "Reconciliation sweep could not list tenants");
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    metrics.record(&batch);

    if config.log_updates {
        for report in &batch.reports {
            for item in report.items.iter().filter(|i| i.status == ItemStatus::Updated) {
                tracing::info!(
                    tenant_id = %report.tenant_id,
                    equipment = %item.name,
                    previous = item.previous,
                    current = item.current,
                    "Counter corrected"
                );
            }
        }
    }

    if batch.counters_updated > 0 || batch.counters_failed > 0 || !batch.failures.is_empty() {
        tracing::info!(
            tenants = batch.tenants_checked,
            counters_checked = batch.counters_checked,
            counters_updated = batch.counters_updated,
            counters_failed = batch.counters_failed,
            tenant_failures = batch.failures.len(),
            duration_ms = batch.duration_ms,
            "Reconciliation sweep cycle completed"
        );
    } else {
        tracing::trace!(
            tenants = batch.tenants_checked,
            "Reconciliation sweep cycle completed with no drift"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{EntityIdType, StorageError, StoreOp, TenantId};
    use tally_storage::{Fault, MockStore};

    #[test]
    fn test_config_default() {
        let config = ReconcileJobConfig::default();
        assert!(config.enabled);
        assert_eq!(
            config.interval,
            Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS)
        );
        assert!(!config.log_updates);
    }

    #[test]
    fn test_config_presets() {
        let dev = ReconcileJobConfig::development();
        assert_eq!(dev.interval, Duration::from_secs(DEV_RECONCILE_INTERVAL_SECS));
        assert!(dev.log_updates);
        assert_eq!(ReconcileJobConfig::production(), ReconcileJobConfig::default());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = ReconcileSweepMetrics::new();
        metrics.runs.store(4, Ordering::Relaxed);
        metrics.counters_updated.store(7, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 4);
        assert_eq!(snapshot.counters_updated, 7);
        assert_eq!(snapshot.errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_repairs_drift_and_stops_on_shutdown() -> Result<(), Box<dyn std::error::Error>> {
        let store = MockStore::new();
        let tenant = TenantId::now_v7();
        let celular = store.add_equipment_type(tenant, "CELULAR", 9)?;
        store.create_order(tenant, Some("CELULAR"))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared: SharedStore = Arc::new(store.clone());
        let handle = tokio::spawn(reconcile_sweep_task(
            shared,
            CounterPolicy::default(),
            ReconcileJobConfig::development(),
            shutdown_rx,
        ));

        // First tick fires immediately.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.counter_of(tenant, "CELULAR")?, Some(1));

        // Drift again and let the next tick repair it.
        store.overwrite_counter(tenant, celular, 5)?;
        tokio::time::sleep(Duration::from_secs(DEV_RECONCILE_INTERVAL_SECS)).await;
        assert_eq!(store.counter_of(tenant, "CELULAR")?, Some(1));

        shutdown_tx.send(true)?;
        let metrics = handle.await?;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 2);
        assert_eq!(snapshot.counters_updated, 2);
        assert_eq!(snapshot.errors, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_counts_listing_errors() -> Result<(), Box<dyn std::error::Error>> {
        let store = MockStore::new();
        store.inject(Fault::on(
            StoreOp::ListTenants,
            StorageError::Unavailable {
                reason: "connection refused".to_string(),
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(reconcile_sweep_task(
            Arc::new(store.clone()),
            CounterPolicy::default(),
            ReconcileJobConfig::default(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true)?;
        let snapshot = handle.await?.snapshot();
        assert_eq!(snapshot.runs, 1);
        assert_eq!(snapshot.errors, 1);
        Ok(())
    }
}
