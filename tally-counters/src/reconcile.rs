//! Full counter reconciliation.
//!
//! Rebuilds every counter of a tenant from its service orders and writes
//! only the ones that differ. Running it twice without intervening writes
//! performs zero updates the second time.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tally_core::{CounterPolicy, EquipmentTypeId, TallyResult, TenantId, Timestamp};
use tally_storage::CounterStore;

use crate::usage::{OrphanName, TenantSnapshot};

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Result of writing one drifted counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Updated,
    Failed,
}

/// One drifted counter and what the run did about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconcileItem {
    pub equipment_type_id: EquipmentTypeId,
    pub name: String,
    /// Stored value before the run.
    pub previous: u64,
    /// Stored value after the run. Equals `previous` when the write failed.
    pub current: u64,
    /// Value recomputed from service orders.
    pub expected: u64,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of reconciling one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconcileReport {
    pub tenant_id: TenantId,
    pub counters_checked: usize,
    pub counters_updated: usize,
    pub counters_correct: usize,
    pub counters_failed: usize,
    /// Drifted counters only; correct ones are not listed.
    pub items: Vec<ReconcileItem>,
    pub orphans: Vec<OrphanName>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub started_at: Timestamp,
    pub duration_ms: u64,
}

impl ReconcileReport {
    /// True when every drifted counter was written.
    pub fn is_complete(&self) -> bool {
        self.counters_failed == 0
    }
}

/// A tenant whose reconciliation could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantFailure {
    pub tenant_id: TenantId,
    pub error: String,
}

/// Outcome of reconciling every tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchReconcileReport {
    pub tenants_checked: usize,
    pub counters_checked: usize,
    pub counters_updated: usize,
    pub counters_failed: usize,
    pub reports: Vec<ReconcileReport>,
    pub failures: Vec<TenantFailure>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub started_at: Timestamp,
    pub duration_ms: u64,
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Recompute and repair every counter of one tenant.
///
/// Fails only when the tenant's catalog or orders cannot be read. A failed
/// write marks that item failed and the run continues.
pub async fn reconcile_tenant<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    policy: &CounterPolicy,
) -> TallyResult<ReconcileReport> {
    let started_at = Utc::now();
    let timer = Instant::now();

    let snapshot = TenantSnapshot::load(store, tenant_id).await?;
    let comparisons = snapshot.compare();
    let counters_checked = comparisons.len();

    let mut items = Vec::new();
    for comparison in comparisons.into_iter().filter(|c| c.is_drifted()) {
        let written = store
            .set_usage_counter(tenant_id, comparison.equipment_type_id, comparison.actual)
            .await;

        let (current, status, error) = match written {
            Ok(true) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    equipment_type_id = %comparison.equipment_type_id,
                    equipment = %comparison.name,
                    previous = comparison.stored,
                    current = comparison.actual,
                    "Usage counter corrected"
                );
                (comparison.actual, ItemStatus::Updated, None)
            }
            Ok(false) => (
                comparison.stored,
                ItemStatus::Failed,
                Some("equipment type no longer exists".to_string()),
            ),
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    equipment_type_id = %comparison.equipment_type_id,
                    equipment = %comparison.name,
                    error = %e,
                    "Usage counter correction failed"
                );
                (comparison.stored, ItemStatus::Failed, Some(e.to_string()))
            }
        };

        items.push(ReconcileItem {
            equipment_type_id: comparison.equipment_type_id,
            name: comparison.name,
            previous: comparison.stored,
            current,
            expected: comparison.actual,
            status,
            error,
        });
    }

    let counters_updated = items
        .iter()
        .filter(|i| i.status == ItemStatus::Updated)
        .count();
    let counters_failed = items.len() - counters_updated;
    let orphans = if policy.report_orphans {
        snapshot.orphans()
    } else {
        Vec::new()
    };

    let report = ReconcileReport {
        tenant_id,
        counters_checked,
        counters_updated,
        counters_correct: counters_checked - items.len(),
        counters_failed,
        items,
        orphans,
        started_at,
        duration_ms: timer.elapsed().as_millis() as u64,
    };

    tracing::info!(
        tenant_id = %tenant_id,
        checked = report.counters_checked,
        updated = report.counters_updated,
        failed = report.counters_failed,
        orphans = report.orphans.len(),
        duration_ms = report.duration_ms,
        "Tenant counters reconciled"
    );
    Ok(report)
}

/// Reconcile every tenant that owns a catalog.
///
/// Fails only when the tenant list cannot be read. Tenants are processed one
/// after another and a tenant that fails is recorded and skipped.
pub async fn reconcile_all<S: CounterStore + ?Sized>(
    store: &S,
    policy: &CounterPolicy,
) -> TallyResult<BatchReconcileReport> {
    let started_at = Utc::now();
    let timer = Instant::now();

    let tenants = store.tenant_ids().await?;
    let mut reports = Vec::with_capacity(tenants.len());
    let mut failures = Vec::new();

    for tenant_id in tenants {
        match reconcile_tenant(store, tenant_id, policy).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Tenant reconciliation failed");
                failures.push(TenantFailure {
                    tenant_id,
                    error: e.to_string(),
                });
            }
        }
    }

    let batch = BatchReconcileReport {
        tenants_checked: reports.len() + failures.len(),
        counters_checked: reports.iter().map(|r| r.counters_checked).sum(),
        counters_updated: reports.iter().map(|r| r.counters_updated).sum(),
        counters_failed: reports.iter().map(|r| r.counters_failed).sum(),
        reports,
        failures,
        started_at,
        duration_ms: timer.elapsed().as_millis() as u64,
    };

    tracing::info!(
        tenants = batch.tenants_checked,
        failed_tenants = batch.failures.len(),
        updated = batch.counters_updated,
        duration_ms = batch.duration_ms,
        "Batch reconciliation finished"
    );
    Ok(batch)
}
