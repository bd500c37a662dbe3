//! Timeout wrapper for store implementations.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tally_core::{
    EquipmentType, EquipmentTypeId, OrderEquipmentRef, StorageError, StoreOp, TallyResult,
    TenantId,
};

use crate::CounterStore;

/// Bounds every call to the inner store with a fixed timeout.
///
/// An elapsed call surfaces as [`StorageError::Timeout`]. The inner future is
/// dropped, so a write that already reached the database may still commit.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        op: StoreOp,
        fut: impl Future<Output = TallyResult<T>> + Send,
    ) -> TallyResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%op, timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(StorageError::Timeout {
                    op,
                    elapsed: self.timeout,
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TimedStore<S> {
    async fn tenant_ids(&self) -> TallyResult<Vec<TenantId>> {
        self.bounded(StoreOp::ListTenants, self.inner.tenant_ids())
            .await
    }

    async fn equipment_types(&self, tenant_id: TenantId) -> TallyResult<Vec<EquipmentType>> {
        self.bounded(
            StoreOp::ListEquipmentTypes,
            self.inner.equipment_types(tenant_id),
        )
        .await
    }

    async fn equipment_types_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<Vec<EquipmentType>> {
        self.bounded(
            StoreOp::FindEquipmentByName,
            self.inner.equipment_types_by_name(tenant_id, name),
        )
        .await
    }

    async fn order_equipment(&self, tenant_id: TenantId) -> TallyResult<Vec<OrderEquipmentRef>> {
        self.bounded(
            StoreOp::ListOrderEquipment,
            self.inner.order_equipment(tenant_id),
        )
        .await
    }

    async fn count_orders_with_equipment(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<u64> {
        self.bounded(
            StoreOp::CountOrders,
            self.inner.count_orders_with_equipment(tenant_id, name),
        )
        .await
    }

    async fn set_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        value: u64,
    ) -> TallyResult<bool> {
        self.bounded(
            StoreOp::SetCounter,
            self.inner
                .set_usage_counter(tenant_id, equipment_type_id, value),
        )
        .await
    }

    async fn increment_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        delta: i64,
    ) -> TallyResult<Option<u64>> {
        self.bounded(
            StoreOp::IncrementCounter,
            self.inner
                .increment_usage_counter(tenant_id, equipment_type_id, delta),
        )
        .await
    }

    async fn ping(&self) -> TallyResult<()> {
        self.bounded(StoreOp::Ping, self.inner.ping()).await
    }
}
