//! Records read and written by the counter subsystem.

use crate::identity::{EntityIdType, EquipmentTypeId, ServiceOrderId, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Catalog entry for a named category of equipment serviced by a tenant.
///
/// `name` is unique within a tenant by convention only. `usage_counter` is a
/// derived cache of how many service orders carry exactly this name; it can
/// always be rebuilt from the service orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EquipmentType {
    pub equipment_type_id: EquipmentTypeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub usage_counter: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl EquipmentType {
    /// Build a catalog entry with a zero counter.
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            equipment_type_id: EquipmentTypeId::now_v7(),
            tenant_id,
            name: name.into(),
            usage_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Same entry with a preset counter value.
    pub fn with_counter(mut self, usage_counter: u64) -> Self {
        self.usage_counter = usage_counter;
        self
    }
}

/// Work order tracking the repair of one piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceOrder {
    pub service_order_id: ServiceOrderId,
    pub tenant_id: TenantId,
    /// Free text, not a foreign key. Matched case-sensitively and verbatim.
    pub equipment_name: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl ServiceOrder {
    pub fn new(tenant_id: TenantId, equipment_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            service_order_id: ServiceOrderId::now_v7(),
            tenant_id,
            equipment_name,
            created_at: now,
            updated_at: now,
        }
    }

    /// The equipment name if it takes part in counting.
    pub fn countable_equipment(&self) -> Option<&str> {
        countable_name(self.equipment_name.as_deref())
    }
}

/// Projection of a service order used to build the usage frequency map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEquipmentRef {
    pub service_order_id: ServiceOrderId,
    pub equipment_name: String,
}

/// Whether a free-text equipment name takes part in counting.
///
/// Only the empty name is skipped. Anything else is used verbatim: no
/// trimming, no case folding, so a whitespace-only name is counted as is.
pub fn is_countable(name: &str) -> bool {
    !name.is_empty()
}

/// Filter an optional name down to a countable one.
pub fn countable_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| is_countable(n))
}
