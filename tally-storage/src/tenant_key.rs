//! Tenant-scoped keys for the in-memory store.
//!
//! `TenantScopedKey`'s private constructor makes cross-tenant access
//! unrepresentable: a key cannot be built without a tenant id, and keys sort
//! by tenant first so one tenant's rows form a contiguous range.

use std::ops::RangeInclusive;

use tally_core::{EntityIdType, EntityKind, TenantId};
use uuid::Uuid;

/// A map key that is scoped to a specific tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantScopedKey {
    /// Private inner data - cannot be constructed externally
    inner: TenantKeyInner,
}

/// Field order defines the sort order: tenant, then kind, then entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct TenantKeyInner {
    tenant_id: Uuid,
    entity_kind: EntityKind,
    entity_id: Uuid,
}

impl TenantScopedKey {
    /// Create a new tenant-scoped key.
    pub fn new(tenant_id: TenantId, entity_kind: EntityKind, entity_id: impl EntityIdType) -> Self {
        Self::from_parts(tenant_id.as_uuid(), entity_kind, entity_id.as_uuid())
    }

    fn from_parts(tenant_id: Uuid, entity_kind: EntityKind, entity_id: Uuid) -> Self {
        Self {
            inner: TenantKeyInner {
                tenant_id,
                entity_kind,
                entity_id,
            },
        }
    }

    /// Get the tenant ID this key is scoped to.
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.inner.tenant_id)
    }

    /// Get the entity kind for this key.
    pub fn entity_kind(&self) -> EntityKind {
        self.inner.entity_kind
    }

    /// Get the raw entity ID for this key.
    pub fn entity_id(&self) -> Uuid {
        self.inner.entity_id
    }

    /// Inclusive key range covering every entity of `entity_kind` for one tenant.
    pub fn tenant_range(tenant_id: TenantId, entity_kind: EntityKind) -> RangeInclusive<Self> {
        Self::from_parts(tenant_id.as_uuid(), entity_kind, Uuid::nil())
            ..=Self::from_parts(tenant_id.as_uuid(), entity_kind, Uuid::from_u128(u128::MAX))
    }
}
