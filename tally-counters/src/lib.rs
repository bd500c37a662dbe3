//! TALLY Counters - Equipment Usage Counter Maintenance
//!
//! Keeps each equipment type's `usage_counter` equal to the number of
//! service orders carrying its exact name:
//! - [`on_order_created`] and [`on_order_equipment_changed`] keep counters
//!   approximately correct as orders change, failing open.
//! - [`reconcile_tenant`] and [`reconcile_all`] rebuild counters from the
//!   orders and write only the ones that drifted.
//! - [`compute_drift`] runs the same comparison without writing.
//!
//! No state lives in this crate. Every entry point takes the store handle and
//! the tenant id explicitly.

pub mod drift;
pub mod incremental;
pub mod reconcile;
pub mod usage;

pub use drift::{compute_drift, compute_drift_all, BatchDriftReport, DriftReport};
pub use incremental::{
    on_order_created, on_order_equipment_changed, recount_equipment, CounterValue,
    EquipmentChangeOutcome, HookOutcome,
};
pub use reconcile::{
    reconcile_all, reconcile_tenant, BatchReconcileReport, ItemStatus, ReconcileItem,
    ReconcileReport, TenantFailure,
};
pub use usage::{CounterComparison, OrphanName, TenantSnapshot, UsageTally};
