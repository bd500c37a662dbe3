//! Incremental counter maintenance hooks.
//!
//! Called by the order flows after the order row is persisted. Both hooks
//! fail open: store errors are logged and reported in the outcome, never
//! returned, so a counter problem cannot fail the business operation. A
//! counter left stale here is repaired by the next reconciliation.

use serde::{Deserialize, Serialize};
use tally_core::{countable_name, EquipmentType, EquipmentTypeId, TallyResult, TenantId};
use tally_storage::CounterStore;

/// Counter value after a hook wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CounterValue {
    pub equipment_type_id: EquipmentTypeId,
    pub value: u64,
}

/// What a hook did for one equipment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HookOutcome {
    /// Every catalog entry with the name was written.
    Updated {
        equipment_name: String,
        counters: Vec<CounterValue>,
    },
    /// No catalog entry carries the name. Nothing is created.
    NotCataloged { equipment_name: String },
    /// Empty or missing name, or nothing changed.
    Skipped,
    /// A store call failed and the counter was left stale.
    Failed {
        equipment_name: String,
        error: String,
    },
}

impl HookOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HookOutcome::Failed { .. })
    }

    fn failed(equipment_name: &str, error: impl ToString) -> Self {
        HookOutcome::Failed {
            equipment_name: equipment_name.to_string(),
            error: error.to_string(),
        }
    }
}

/// Outcome of the edit hook, one entry per side of the rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EquipmentChangeOutcome {
    pub old_name: HookOutcome,
    pub new_name: HookOutcome,
}

// ============================================================================
// CREATE PATH
// ============================================================================

/// Count a newly created order against its equipment type.
///
/// Uses the store's atomic increment so concurrent creates never lose an
/// update. Every catalog entry with the exact name is incremented.
pub async fn on_order_created<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    equipment_name: Option<&str>,
) -> HookOutcome {
    let Some(name) = countable_name(equipment_name) else {
        tracing::debug!(tenant_id = %tenant_id, "Order created without equipment name, nothing to count");
        return HookOutcome::Skipped;
    };

    let matches = match store.equipment_types_by_name(tenant_id, name).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(tenant_id = %tenant_id, equipment = %name, error = %e, "Equipment lookup failed, counter left stale");
            return HookOutcome::failed(name, e);
        }
    };

    if matches.is_empty() {
        tracing::info!(tenant_id = %tenant_id, equipment = %name, "Equipment name not in catalog, counter not updated");
        return HookOutcome::NotCataloged {
            equipment_name: name.to_string(),
        };
    }

    let mut counters = Vec::with_capacity(matches.len());
    let mut first_error = None;
    for equipment in &matches {
        match store
            .increment_usage_counter(tenant_id, equipment.equipment_type_id, 1)
            .await
        {
            Ok(Some(value)) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    equipment_type_id = %equipment.equipment_type_id,
                    equipment = %name,
                    value,
                    "Usage counter incremented"
                );
                counters.push(CounterValue {
                    equipment_type_id: equipment.equipment_type_id,
                    value,
                });
            }
            Ok(None) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    equipment_type_id = %equipment.equipment_type_id,
                    "Equipment type vanished before increment"
                );
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    equipment_type_id = %equipment.equipment_type_id,
                    equipment = %name,
                    error = %e,
                    "Counter increment failed, counter left stale"
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => HookOutcome::failed(name, e),
        None => HookOutcome::Updated {
            equipment_name: name.to_string(),
            counters,
        },
    }
}

// ============================================================================
// EDIT PATH
// ============================================================================

/// Recount both sides of an order's equipment rename.
///
/// Must be called after the order change is persisted, so each recount sees
/// it. The two recounts are independent: one failing does not stop the other.
pub async fn on_order_equipment_changed<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    old_name: Option<&str>,
    new_name: Option<&str>,
) -> EquipmentChangeOutcome {
    let old_name = countable_name(old_name);
    let new_name = countable_name(new_name);

    if old_name == new_name {
        tracing::debug!(tenant_id = %tenant_id, "Equipment name unchanged, nothing to recount");
        return EquipmentChangeOutcome {
            old_name: HookOutcome::Skipped,
            new_name: HookOutcome::Skipped,
        };
    }

    let old_outcome = match old_name {
        Some(name) => recount_or_fail_open(store, tenant_id, name).await,
        None => HookOutcome::Skipped,
    };
    let new_outcome = match new_name {
        Some(name) => recount_or_fail_open(store, tenant_id, name).await,
        None => HookOutcome::Skipped,
    };

    EquipmentChangeOutcome {
        old_name: old_outcome,
        new_name: new_outcome,
    }
}

async fn recount_or_fail_open<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    name: &str,
) -> HookOutcome {
    match recount_equipment(store, tenant_id, name).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(tenant_id = %tenant_id, equipment = %name, error = %e, "Recount failed, counter left stale");
            HookOutcome::failed(name, e)
        }
    }
}

/// Recount one equipment name from the orders and overwrite every matching
/// catalog entry with the result.
///
/// Unlike the hooks this propagates store errors.
pub async fn recount_equipment<S: CounterStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    name: &str,
) -> TallyResult<HookOutcome> {
    let matches: Vec<EquipmentType> = store.equipment_types_by_name(tenant_id, name).await?;
    if matches.is_empty() {
        tracing::info!(tenant_id = %tenant_id, equipment = %name, "Equipment name not in catalog, nothing to recount");
        return Ok(HookOutcome::NotCataloged {
            equipment_name: name.to_string(),
        });
    }

    let count = store.count_orders_with_equipment(tenant_id, name).await?;

    let mut counters = Vec::with_capacity(matches.len());
    for equipment in matches {
        if store
            .set_usage_counter(tenant_id, equipment.equipment_type_id, count)
            .await?
        {
            counters.push(CounterValue {
                equipment_type_id: equipment.equipment_type_id,
                value: count,
            });
        }
    }

    tracing::debug!(tenant_id = %tenant_id, equipment = %name, count, "Usage counter recounted");
    Ok(HookOutcome::Updated {
        equipment_name: name.to_string(),
        counters,
    })
}
