//! Ground-truth usage counts.
//!
//! [`UsageTally`] is the frequency map of equipment names over a tenant's
//! service orders. [`TenantSnapshot`] pairs it with the tenant's catalog and
//! is the single comparison path used by both the drift reporter and the
//! reconciler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::{
    is_countable, EquipmentType, EquipmentTypeId, OrderEquipmentRef, TallyResult, TenantId,
};
use tally_storage::CounterStore;

// ============================================================================
// FREQUENCY MAP
// ============================================================================

/// Number of service orders per exact equipment name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTally {
    counts: BTreeMap<String, u64>,
}

impl UsageTally {
    /// Build a tally from raw equipment names. Empty names are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            if is_countable(name) {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    /// Build a tally from order projections.
    pub fn from_orders(orders: &[OrderEquipmentRef]) -> Self {
        Self::from_names(orders.iter().map(|o| o.equipment_name.as_str()))
    }

    /// True usage count for `name`, zero when no order carries it.
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Distinct names seen, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of counted orders.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

// ============================================================================
// COMPARISON
// ============================================================================

/// Stored counter versus ground truth for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CounterComparison {
    pub equipment_type_id: EquipmentTypeId,
    pub name: String,
    /// Counter value currently stored.
    pub stored: u64,
    /// Counter value recomputed from service orders.
    pub actual: u64,
}

impl CounterComparison {
    pub fn is_drifted(&self) -> bool {
        self.stored != self.actual
    }
}

/// Equipment name found on orders that matches no catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrphanName {
    pub name: String,
    /// Number of orders carrying the name.
    pub orders: u64,
}

/// A tenant's catalog together with the ground-truth tally of its orders.
#[derive(Debug, Clone)]
pub struct TenantSnapshot {
    pub tenant_id: TenantId,
    pub catalog: Vec<EquipmentType>,
    pub tally: UsageTally,
}

impl TenantSnapshot {
    /// Read the full catalog and every order name of a tenant.
    ///
    /// Both reads are unpaginated. Counting against a partial order list
    /// would write wrong counters.
    pub async fn load<S: CounterStore + ?Sized>(store: &S, tenant_id: TenantId) -> TallyResult<Self> {
        let catalog = store.equipment_types(tenant_id).await?;
        let orders = store.order_equipment(tenant_id).await?;
        tracing::debug!(
            tenant_id = %tenant_id,
            equipment_types = catalog.len(),
            orders = orders.len(),
            "Loaded tenant snapshot"
        );
        Ok(Self::from_parts(tenant_id, catalog, &orders))
    }

    pub fn from_parts(
        tenant_id: TenantId,
        catalog: Vec<EquipmentType>,
        orders: &[OrderEquipmentRef],
    ) -> Self {
        Self {
            tenant_id,
            catalog,
            tally: UsageTally::from_orders(orders),
        }
    }

    /// Compare every catalog entry against the tally, in catalog order.
    ///
    /// Entries sharing a name are compared independently against the same count.
    pub fn compare(&self) -> Vec<CounterComparison> {
        self.catalog
            .iter()
            .map(|equipment| CounterComparison {
                equipment_type_id: equipment.equipment_type_id,
                name: equipment.name.clone(),
                stored: equipment.usage_counter,
                actual: self.tally.count(&equipment.name),
            })
            .collect()
    }

    /// Tallied names with no catalog entry, sorted by name.
    pub fn orphans(&self) -> Vec<OrphanName> {
        self.tally
            .counts
            .iter()
            .filter(|(name, _)| !self.catalog.iter().any(|e| &e.name == *name))
            .map(|(name, orders)| OrphanName {
                name: name.clone(),
                orders: *orders,
            })
            .collect()
    }
}
