//! TALLY Core - Entity Types
//!
//! Pure data structures shared by every TALLY crate: typed identifiers, the
//! two records the counter subsystem reads and writes, the error taxonomy,
//! and the counter maintenance policy.
//!
//! This crate contains ONLY data types - no store access and no counter logic.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::CounterPolicy;
pub use entities::{countable_name, is_countable, EquipmentType, OrderEquipmentRef, ServiceOrder};
pub use error::{ConfigError, StorageError, StoreOp, TallyError, TallyResult, ValidationError};
pub use identity::{
    new_entity_id, EntityId, EntityIdType, EntityKind, EquipmentTypeId, ServiceOrderId, TenantId,
    Timestamp,
};
