//! In-memory store for tests and the `memory` backend.
//!
//! Rows live in tenant-scoped ordered maps. Besides the [`CounterStore`]
//! contract, `MockStore` exposes the order mutations that the order-management
//! flows would perform, fault injection, artificial latency and per-operation
//! call counts so tests can exercise the fail-open paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tally_core::{
    EntityIdType, EntityKind, EquipmentType, EquipmentTypeId, OrderEquipmentRef, ServiceOrder,
    ServiceOrderId, StorageError, StoreOp, TallyResult, TenantId,
};

use crate::{apply_delta, CounterStore, TenantScopedKey};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// A scripted failure returned by the next matching store call(s).
#[derive(Debug, Clone)]
pub struct Fault {
    op: StoreOp,
    equipment_name: Option<String>,
    error: StorageError,
    remaining: Option<usize>,
}

impl Fault {
    /// Fail every call of `op` with `error`.
    pub fn on(op: StoreOp, error: StorageError) -> Self {
        Self {
            op,
            equipment_name: None,
            error,
            remaining: None,
        }
    }

    /// Only fail calls that concern this exact equipment name.
    pub fn for_equipment(mut self, name: impl Into<String>) -> Self {
        self.equipment_name = Some(name.into());
        self
    }

    /// Stop failing after `n` hits.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, op: StoreOp, equipment_name: Option<&str>) -> bool {
        self.op == op
            && match &self.equipment_name {
                Some(name) => equipment_name == Some(name.as_str()),
                None => true,
            }
    }
}

// ============================================================================
// MOCK STORE
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    equipment: BTreeMap<TenantScopedKey, EquipmentType>,
    orders: BTreeMap<TenantScopedKey, ServiceOrder>,
}

/// In-memory store. Clones share the same underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<HashMap<StoreOp, usize>>>,
}

impl MockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TallyResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> TallyResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Clear all stored rows. Faults and call counts are kept.
    pub fn clear(&self) -> TallyResult<()> {
        let mut tables = self.write()?;
        tables.equipment.clear();
        tables.orders.clear();
        Ok(())
    }

    // === Catalog ===

    /// Insert an equipment type as the catalog-management flow would.
    pub fn insert_equipment_type(&self, equipment: EquipmentType) -> TallyResult<EquipmentTypeId> {
        let id = equipment.equipment_type_id;
        let key = TenantScopedKey::new(equipment.tenant_id, EntityKind::EquipmentType, id);
        let mut tables = self.write()?;
        if tables.equipment.contains_key(&key) {
            return Err(StorageError::WriteFailed {
                entity_kind: EntityKind::EquipmentType,
                id: id.as_uuid(),
                reason: "already exists".to_string(),
            }
            .into());
        }
        tables.equipment.insert(key, equipment);
        Ok(id)
    }

    /// Convenience wrapper around [`MockStore::insert_equipment_type`].
    pub fn add_equipment_type(
        &self,
        tenant_id: TenantId,
        name: &str,
        usage_counter: u64,
    ) -> TallyResult<EquipmentTypeId> {
        self.insert_equipment_type(EquipmentType::new(tenant_id, name).with_counter(usage_counter))
    }

    /// Get one equipment type.
    pub fn equipment_type(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
    ) -> TallyResult<Option<EquipmentType>> {
        let key = TenantScopedKey::new(tenant_id, EntityKind::EquipmentType, equipment_type_id);
        Ok(self.read()?.equipment.get(&key).cloned())
    }

    /// Stored counter of the first equipment type carrying `name`.
    pub fn counter_of(&self, tenant_id: TenantId, name: &str) -> TallyResult<Option<u64>> {
        let tables = self.read()?;
        Ok(tables
            .equipment
            .range(TenantScopedKey::tenant_range(tenant_id, EntityKind::EquipmentType))
            .map(|(_, e)| e)
            .find(|e| e.name == name)
            .map(|e| e.usage_counter))
    }

    /// Overwrite a counter directly, bypassing faults and call accounting.
    ///
    /// Models out-of-band edits (manual fixes, legacy scripts, lost updates).
    pub fn overwrite_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        value: u64,
    ) -> TallyResult<()> {
        let key = TenantScopedKey::new(tenant_id, EntityKind::EquipmentType, equipment_type_id);
        let mut tables = self.write()?;
        let equipment = tables.equipment.get_mut(&key).ok_or(StorageError::NotFound {
            entity_kind: EntityKind::EquipmentType,
            id: equipment_type_id.as_uuid(),
        })?;
        equipment.usage_counter = value;
        Ok(())
    }

    /// Number of equipment types across all tenants.
    pub fn equipment_type_count(&self) -> TallyResult<usize> {
        Ok(self.read()?.equipment.len())
    }

    // === Orders ===

    /// Insert a service order as the order-creation flow would.
    pub fn insert_order(&self, order: ServiceOrder) -> TallyResult<ServiceOrderId> {
        let id = order.service_order_id;
        let key = TenantScopedKey::new(order.tenant_id, EntityKind::ServiceOrder, id);
        let mut tables = self.write()?;
        if tables.orders.contains_key(&key) {
            return Err(StorageError::WriteFailed {
                entity_kind: EntityKind::ServiceOrder,
                id: id.as_uuid(),
                reason: "already exists".to_string(),
            }
            .into());
        }
        tables.orders.insert(key, order);
        Ok(id)
    }

    /// Create and persist a service order with the given equipment name.
    pub fn create_order(
        &self,
        tenant_id: TenantId,
        equipment_name: Option<&str>,
    ) -> TallyResult<ServiceOrderId> {
        self.insert_order(ServiceOrder::new(
            tenant_id,
            equipment_name.map(str::to_string),
        ))
    }

    /// Persist a new equipment name on an order. Returns the previous name.
    pub fn set_order_equipment(
        &self,
        tenant_id: TenantId,
        service_order_id: ServiceOrderId,
        equipment_name: Option<&str>,
    ) -> TallyResult<Option<String>> {
        let key = TenantScopedKey::new(tenant_id, EntityKind::ServiceOrder, service_order_id);
        let mut tables = self.write()?;
        let order = tables.orders.get_mut(&key).ok_or(StorageError::NotFound {
            entity_kind: EntityKind::ServiceOrder,
            id: service_order_id.as_uuid(),
        })?;
        let previous = std::mem::replace(
            &mut order.equipment_name,
            equipment_name.map(str::to_string),
        );
        order.updated_at = Utc::now();
        Ok(previous)
    }

    /// Delete an order. Returns whether it existed.
    pub fn delete_order(
        &self,
        tenant_id: TenantId,
        service_order_id: ServiceOrderId,
    ) -> TallyResult<bool> {
        let key = TenantScopedKey::new(tenant_id, EntityKind::ServiceOrder, service_order_id);
        Ok(self.write()?.orders.remove(&key).is_some())
    }

    /// Number of service orders across all tenants.
    pub fn order_count(&self) -> TallyResult<usize> {
        Ok(self.read()?.orders.len())
    }

    // === Test instrumentation ===

    /// Register a scripted failure.
    pub fn inject(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fault);
    }

    /// Remove all scripted failures.
    pub fn clear_faults(&self) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Delay every contract call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// How many times a contract operation was invoked.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Reset the per-operation call counts.
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    async fn before(&self, op: StoreOp, equipment_name: Option<&str>) -> TallyResult<()> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(op)
            .or_insert(0) += 1;

        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        let Some(index) = faults.iter().position(|f| f.matches(op, equipment_name)) else {
            return Ok(());
        };
        let error = faults[index].error.clone();
        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                faults.remove(index);
            }
        }
        tracing::debug!(%op, equipment = ?equipment_name, error = %error, "Injected store fault");
        Err(error.into())
    }

    fn equipment_name_of(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
    ) -> TallyResult<Option<String>> {
        Ok(self
            .equipment_type(tenant_id, equipment_type_id)?
            .map(|e| e.name))
    }
}

#[async_trait]
impl CounterStore for MockStore {
    async fn tenant_ids(&self) -> TallyResult<Vec<TenantId>> {
        self.before(StoreOp::ListTenants, None).await?;
        let tables = self.read()?;
        let mut tenants: Vec<TenantId> = tables.equipment.keys().map(|k| k.tenant_id()).collect();
        tenants.dedup();
        Ok(tenants)
    }

    async fn equipment_types(&self, tenant_id: TenantId) -> TallyResult<Vec<EquipmentType>> {
        self.before(StoreOp::ListEquipmentTypes, None).await?;
        let tables = self.read()?;
        Ok(tables
            .equipment
            .range(TenantScopedKey::tenant_range(tenant_id, EntityKind::EquipmentType))
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn equipment_types_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<Vec<EquipmentType>> {
        self.before(StoreOp::FindEquipmentByName, Some(name)).await?;
        let tables = self.read()?;
        Ok(tables
            .equipment
            .range(TenantScopedKey::tenant_range(tenant_id, EntityKind::EquipmentType))
            .map(|(_, e)| e)
            .filter(|e| e.name == name)
            .cloned()
            .collect())
    }

    async fn order_equipment(&self, tenant_id: TenantId) -> TallyResult<Vec<OrderEquipmentRef>> {
        self.before(StoreOp::ListOrderEquipment, None).await?;
        let tables = self.read()?;
        Ok(tables
            .orders
            .range(TenantScopedKey::tenant_range(tenant_id, EntityKind::ServiceOrder))
            .filter_map(|(_, o)| {
                o.equipment_name.as_ref().map(|name| OrderEquipmentRef {
                    service_order_id: o.service_order_id,
                    equipment_name: name.clone(),
                })
            })
            .collect())
    }

    async fn count_orders_with_equipment(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<u64> {
        self.before(StoreOp::CountOrders, Some(name)).await?;
        let tables = self.read()?;
        let count = tables
            .orders
            .range(TenantScopedKey::tenant_range(tenant_id, EntityKind::ServiceOrder))
            .filter(|(_, o)| o.equipment_name.as_deref() == Some(name))
            .count();
        Ok(count as u64)
    }

    async fn set_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        value: u64,
    ) -> TallyResult<bool> {
        let name = self.equipment_name_of(tenant_id, equipment_type_id)?;
        self.before(StoreOp::SetCounter, name.as_deref()).await?;

        let key = TenantScopedKey::new(tenant_id, EntityKind::EquipmentType, equipment_type_id);
        let mut tables = self.write()?;
        match tables.equipment.get_mut(&key) {
            Some(equipment) => {
                equipment.usage_counter = value;
                equipment.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        delta: i64,
    ) -> TallyResult<Option<u64>> {
        let name = self.equipment_name_of(tenant_id, equipment_type_id)?;
        self.before(StoreOp::IncrementCounter, name.as_deref()).await?;

        // Read and write under one write guard, so concurrent increments never lose an update.
        let key = TenantScopedKey::new(tenant_id, EntityKind::EquipmentType, equipment_type_id);
        let mut tables = self.write()?;
        Ok(tables.equipment.get_mut(&key).map(|equipment| {
            equipment.usage_counter = apply_delta(equipment.usage_counter, delta);
            equipment.updated_at = Utc::now();
            equipment.usage_counter
        }))
    }

    async fn ping(&self) -> TallyResult<()> {
        self.before(StoreOp::Ping, None).await?;
        self.read().map(|_| ())
    }
}

// ============================================================================
// TESTS
// ============================================================================
