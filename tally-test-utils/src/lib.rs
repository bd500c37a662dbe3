//! TALLY Test Utilities
//!
//! Centralized test infrastructure for the TALLY workspace:
//! - Proptest generators for ids, equipment names and order workloads
//! - Test fixtures for common repair-shop scenarios
//! - Custom assertions for counter consistency

// Re-export mock storage from its source crate
pub use tally_storage::{CounterStore, Fault, MockStore};

// Re-export core types for convenience
pub use tally_core::{
    EntityIdType, EquipmentType, EquipmentTypeId, ServiceOrderId, StorageError, StoreOp,
    TallyError, TallyResult, TenantId,
};

use uuid::Uuid;

/// Equipment names present in generated catalogs.
pub const CATALOG_NAMES: &[&str] = &["CELULAR", "FONE DE OUVIDO", "NOTEBOOK", "TABLET"];

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating TALLY inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        arb_uuid().prop_map(TenantId::new)
    }

    pub fn arb_equipment_type_id() -> impl Strategy<Value = EquipmentTypeId> {
        arb_uuid().prop_map(EquipmentTypeId::new)
    }

    /// Generate an order's equipment field.
    ///
    /// Mostly catalog names, plus near-misses (case, orphans), empty names and nulls.
    pub fn arb_equipment_name() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            6 => prop::sample::select(CATALOG_NAMES).prop_map(|n| Some(n.to_string())),
            1 => Just(Some("celular".to_string())),
            1 => Just(Some("VIDEOGAME".to_string())),
            1 => Just(Some(String::new())),
            1 => Just(None),
        ]
    }

    /// Generate one workload step. Indices are reduced modulo the live set.
    pub fn arb_order_op() -> impl Strategy<Value = OrderOp> {
        prop_oneof![
            4 => arb_equipment_name().prop_map(|equipment_name| OrderOp::Create { equipment_name }),
            2 => (any::<usize>(), arb_equipment_name())
                .prop_map(|(order, equipment_name)| OrderOp::ChangeEquipment { order, equipment_name }),
            1 => any::<usize>().prop_map(|order| OrderOp::Delete { order }),
            1 => (any::<usize>(), 0u64..50)
                .prop_map(|(equipment, value)| OrderOp::CorruptCounter { equipment, value }),
        ]
    }

    pub fn arb_order_ops(max_len: usize) -> impl Strategy<Value = Vec<OrderOp>> {
        prop::collection::vec(arb_order_op(), 0..max_len)
    }
}

// ============================================================================
// WORKLOADS
// ============================================================================

/// A mutation applied to a tenant's orders or counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOp {
    Create {
        equipment_name: Option<String>,
    },
    ChangeEquipment {
        order: usize,
        equipment_name: Option<String>,
    },
    Delete {
        order: usize,
    },
    /// Out-of-band counter write that bypasses the hooks.
    CorruptCounter {
        equipment: usize,
        value: u64,
    },
}

/// What applying an [`OrderOp`] did, so callers can fire the matching hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedOp {
    Created {
        equipment_name: Option<String>,
    },
    Changed {
        old_name: Option<String>,
        new_name: Option<String>,
    },
    Deleted,
    Corrupted,
    Noop,
}

/// One tenant's catalog and live orders inside a [`MockStore`].
#[derive(Debug, Clone)]
pub struct Workload {
    pub tenant_id: TenantId,
    pub equipment: Vec<EquipmentTypeId>,
    pub orders: Vec<ServiceOrderId>,
}

impl Workload {
    /// Create a tenant whose catalog holds `names` with zero counters.
    pub fn seed(store: &MockStore, names: &[&str]) -> TallyResult<Self> {
        let tenant_id = TenantId::now_v7();
        let equipment = names
            .iter()
            .map(|name| store.add_equipment_type(tenant_id, name, 0))
            .collect::<TallyResult<Vec<_>>>()?;
        Ok(Self {
            tenant_id,
            equipment,
            orders: Vec::new(),
        })
    }

    /// Persist one step. Hooks are the caller's job.
    pub fn apply(&mut self, store: &MockStore, op: &OrderOp) -> TallyResult<AppliedOp> {
        match op {
            OrderOp::Create { equipment_name } => {
                let id = store.create_order(self.tenant_id, equipment_name.as_deref())?;
                self.orders.push(id);
                Ok(AppliedOp::Created {
                    equipment_name: equipment_name.clone(),
                })
            }
            OrderOp::ChangeEquipment {
                order,
                equipment_name,
            } => {
                if self.orders.is_empty() {
                    return Ok(AppliedOp::Noop);
                }
                let id = self.orders[order % self.orders.len()];
                let old_name =
                    store.set_order_equipment(self.tenant_id, id, equipment_name.as_deref())?;
                Ok(AppliedOp::Changed {
                    old_name,
                    new_name: equipment_name.clone(),
                })
            }
            OrderOp::Delete { order } => {
                if self.orders.is_empty() {
                    return Ok(AppliedOp::Noop);
                }
                let id = self.orders.remove(order % self.orders.len());
                store.delete_order(self.tenant_id, id)?;
                Ok(AppliedOp::Deleted)
            }
            OrderOp::CorruptCounter { equipment, value } => {
                if self.equipment.is_empty() {
                    return Ok(AppliedOp::Noop);
                }
                let id = self.equipment[equipment % self.equipment.len()];
                store.overwrite_counter(self.tenant_id, id, *value)?;
                Ok(AppliedOp::Corrupted)
            }
        }
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built scenarios for common test cases.

    use super::*;

    /// A shop with "CELULAR" used by three orders and an unused "FONE DE OUVIDO".
    #[derive(Debug, Clone)]
    pub struct RepairShop {
        pub tenant_id: TenantId,
        pub celular: EquipmentTypeId,
        pub fone_de_ouvido: EquipmentTypeId,
        pub celular_orders: Vec<ServiceOrderId>,
    }

    /// Seed a consistent [`RepairShop`] into `store`.
    pub fn repair_shop(store: &MockStore) -> TallyResult<RepairShop> {
        let tenant_id = TenantId::now_v7();
        let celular = store.add_equipment_type(tenant_id, "CELULAR", 3)?;
        let fone_de_ouvido = store.add_equipment_type(tenant_id, "FONE DE OUVIDO", 0)?;
        let celular_orders = (0..3)
            .map(|_| store.create_order(tenant_id, Some("CELULAR")))
            .collect::<TallyResult<Vec<_>>>()?;
        Ok(RepairShop {
            tenant_id,
            celular,
            fone_de_ouvido,
            celular_orders,
        })
    }

    /// Transient store failure.
    pub fn unavailable() -> StorageError {
        StorageError::Unavailable {
            reason: "connection refused".to_string(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for counter consistency.

    use super::*;

    /// A counter that disagrees with a direct count of the orders.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Mismatch {
        pub name: String,
        pub stored: u64,
        pub actual: u64,
    }

    /// Compare every stored counter of a tenant against a direct count.
    ///
    /// Uses the count aggregation only, independent of the frequency map.
    pub async fn counter_mismatches<S: CounterStore + ?Sized>(
        store: &S,
        tenant_id: TenantId,
    ) -> TallyResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        for equipment in store.equipment_types(tenant_id).await? {
            let actual = store
                .count_orders_with_equipment(tenant_id, &equipment.name)
                .await?;
            if actual != equipment.usage_counter {
                mismatches.push(Mismatch {
                    name: equipment.name,
                    stored: equipment.usage_counter,
                    actual,
                });
            }
        }
        Ok(mismatches)
    }

    /// Assert that a TallyResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TallyResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a TallyResult is a transient storage failure.
    #[track_caller]
    pub fn assert_transient<T: std::fmt::Debug>(result: &TallyResult<T>) {
        match result {
            Err(e) if e.is_transient() => {}
            other => panic!("Expected transient error, got: {:?}", other),
        }
    }

    /// Assert that a TallyResult is a timeout on `op`.
    #[track_caller]
    pub fn assert_timeout<T: std::fmt::Debug>(result: &TallyResult<T>, op: StoreOp) {
        match result {
            Err(TallyError::Storage(StorageError::Timeout { op: actual, .. })) => {
                assert_eq!(*actual, op, "Wrong operation in Timeout error");
            }
            other => panic!("Expected Timeout error for {}, got: {:?}", op, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_ops_on_empty_tenant_are_noops() -> TallyResult<()> {
        let store = MockStore::new();
        let mut workload = Workload::seed(&store, &[])?;

        let applied = workload.apply(
            &store,
            &OrderOp::ChangeEquipment {
                order: 3,
                equipment_name: Some("TV".to_string()),
            },
        )?;
        assert_eq!(applied, AppliedOp::Noop);
        assert_eq!(
            workload.apply(&store, &OrderOp::CorruptCounter { equipment: 0, value: 9 })?,
            AppliedOp::Noop
        );
        Ok(())
    }

    #[test]
    fn test_workload_change_reports_previous_name() -> TallyResult<()> {
        let store = MockStore::new();
        let mut workload = Workload::seed(&store, CATALOG_NAMES)?;
        workload.apply(
            &store,
            &OrderOp::Create {
                equipment_name: Some("CELULAR".to_string()),
            },
        )?;

        let applied = workload.apply(
            &store,
            &OrderOp::ChangeEquipment {
                order: 7,
                equipment_name: Some("TABLET".to_string()),
            },
        )?;
        assert_eq!(
            applied,
            AppliedOp::Changed {
                old_name: Some("CELULAR".to_string()),
                new_name: Some("TABLET".to_string()),
            }
        );
        Ok(())
    }

    #[test]
    fn test_repair_shop_fixture() -> TallyResult<()> {
        let store = MockStore::new();
        let shop = fixtures::repair_shop(&store)?;
        assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(3));
        assert_eq!(shop.celular_orders.len(), 3);
        assert_eq!(store.order_count()?, 3);
        Ok(())
    }
}
