//! Read-only drift reporting.

use serde::{Deserialize, Serialize};
use tally_core::{CounterPolicy, TallyResult, TenantId, Timestamp};
use tally_storage::CounterStore;

use crate::reconcile::TenantFailure;
use crate::usage::{CounterComparison, OrphanName, TenantSnapshot};

/// Answer to "are tenant T's counters correct right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DriftReport {
    pub tenant_id: TenantId,
    /// Catalog entries compared.
    pub counters_checked: usize,
    /// Entries whose stored counter matches ground truth.
    pub counters_correct: usize,
    /// Entries whose stored counter differs from ground truth.
    pub drifted: Vec<CounterComparison>,
    /// Names on orders that match no catalog entry.
    pub orphans: Vec<OrphanName>,
    /// True when nothing drifted.
    pub in_sync: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub checked_at: Timestamp,
}

impl DriftReport {
    pub(crate) fn from_snapshot(snapshot: &TenantSnapshot, policy: &CounterPolicy) -> Self {
        let comparisons = snapshot.compare();
        let counters_checked = comparisons.len();
        let drifted: Vec<_> = comparisons.into_iter().filter(|c| c.is_drifted()).collect();
        let orphans = if policy.report_orphans {
            snapshot.orphans()
        } else {
            Vec::new()
        };

        Self {
            tenant_id: snapshot.tenant_id,
            counters_checked,
            counters_correct: counters_checked - drifted.len(),
            in_sync: drifted.is_empty(),
            drifted,
            orphans,
            checked_at: chrono::Utc::now(),
        }
    }

    /// Net difference between stored and actual totals over drifted entries.
    pub fn total_drift(&self) -> i128 {
        self.drifted
            .iter()
            .map(|c| i128::from(c.stored) - i128::from(c.actual))
            .sum()
    }
}

/// Compare stored counters against freshly computed ground truth. Never writes.
pub async fn compute_drift<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    policy: &CounterPolicy,
) -> TallyResult<DriftReport> {
    let snapshot = TenantSnapshot::load(store, tenant_id).await?;
    let report = DriftReport::from_snapshot(&snapshot, policy);

    if report.in_sync {
        tracing::debug!(tenant_id = %tenant_id, counters = report.counters_checked, "Counters in sync");
    } else {
        tracing::info!(
            tenant_id = %tenant_id,
            drifted = report.drifted.len(),
            orphans = report.orphans.len(),
            "Counter drift detected"
        );
    }
    Ok(report)
}

/// Drift across every tenant that owns a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchDriftReport {
    pub tenants_checked: usize,
    /// True only when every tenant was read and found in sync.
    pub in_sync: bool,
    pub reports: Vec<DriftReport>,
    pub failures: Vec<TenantFailure>,
}

/// Drift for every tenant. A tenant that cannot be read is recorded and skipped.
pub async fn compute_drift_all<S: CounterStore + ?Sized>(
    store: &S,
    policy: &CounterPolicy,
) -> TallyResult<BatchDriftReport> {
    let tenants = store.tenant_ids().await?;
    let mut reports = Vec::with_capacity(tenants.len());
    let mut failures = Vec::new();

    for tenant_id in tenants {
        match compute_drift(store, tenant_id, policy).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Drift check failed");
                failures.push(TenantFailure {
                    tenant_id,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(BatchDriftReport {
        tenants_checked: reports.len() + failures.len(),
        in_sync: failures.is_empty() && reports.iter().all(|r| r.in_sync),
        reports,
        failures,
    })
}
