//! TALLY Storage - Source-of-Truth Store Contract
//!
//! Defines the narrow store contract the counter subsystem consumes:
//! exact-match filtered reads, count aggregation, single-row conditional
//! writes and an atomic increment, all scoped by tenant id.
//!
//! The PostgreSQL implementation lives in tally-api. This crate ships the
//! in-memory [`MockStore`] used by tests and the `memory` backend, plus the
//! [`TimedStore`] wrapper that bounds every call with a timeout.

pub mod mock;
pub mod tenant_key;
pub mod timed;

pub use mock::{Fault, MockStore};
pub use tenant_key::TenantScopedKey;
pub use timed::TimedStore;

use async_trait::async_trait;
use tally_core::{EquipmentType, EquipmentTypeId, OrderEquipmentRef, TallyResult, TenantId};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Store contract for counter maintenance.
///
/// Every operation is scoped by tenant. Name matching is exact and
/// case-sensitive. Implementations must not cap or paginate the list
/// operations: the reconciler relies on seeing every row.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Tenants that own at least one equipment type.
    async fn tenant_ids(&self) -> TallyResult<Vec<TenantId>>;

    /// All equipment types of a tenant, including their stored counters.
    async fn equipment_types(&self, tenant_id: TenantId) -> TallyResult<Vec<EquipmentType>>;

    /// Equipment types whose name equals `name` exactly.
    ///
    /// Names are unique by convention only, so this can return several rows.
    async fn equipment_types_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<Vec<EquipmentType>>;

    /// Every service order of the tenant with a non-null equipment name.
    async fn order_equipment(&self, tenant_id: TenantId) -> TallyResult<Vec<OrderEquipmentRef>>;

    /// Number of service orders whose equipment name equals `name` exactly.
    async fn count_orders_with_equipment(&self, tenant_id: TenantId, name: &str)
        -> TallyResult<u64>;

    /// Overwrite a counter. Returns `false` when no such row exists.
    async fn set_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        value: u64,
    ) -> TallyResult<bool>;

    /// Atomically add `delta` to a counter, clamping at zero.
    ///
    /// Returns the new value, or `None` when no such row exists.
    async fn increment_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        delta: i64,
    ) -> TallyResult<Option<u64>>;

    /// Cheap connectivity probe used by readiness checks.
    async fn ping(&self) -> TallyResult<()>;
}

/// Apply a signed delta to a counter without going below zero.
pub fn apply_delta(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta.unsigned_abs())
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}
