//! Error types for TALLY operations

use crate::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Store operation discriminator, used in errors and for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    ListTenants,
    ListEquipmentTypes,
    FindEquipmentByName,
    ListOrderEquipment,
    CountOrders,
    SetCounter,
    IncrementCounter,
    Ping,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::ListTenants => "list_tenants",
            StoreOp::ListEquipmentTypes => "list_equipment_types",
            StoreOp::FindEquipmentByName => "find_equipment_by_name",
            StoreOp::ListOrderEquipment => "list_order_equipment",
            StoreOp::CountOrders => "count_orders",
            StoreOp::SetCounter => "set_counter",
            StoreOp::IncrementCounter => "increment_counter",
            StoreOp::Ping => "ping",
        };
        f.write_str(name)
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_kind} with id {id}")]
    NotFound { entity_kind: EntityKind, id: Uuid },

    #[error("Query {op} failed: {reason}")]
    QueryFailed { op: StoreOp, reason: String },

    #[error("Write failed for {entity_kind} with id {id}: {reason}")]
    WriteFailed {
        entity_kind: EntityKind,
        id: Uuid,
        reason: String,
    },

    #[error("Store operation {op} timed out after {elapsed:?}")]
    Timeout { op: StoreOp, elapsed: Duration },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Whether retrying later (or the next reconciliation) can be expected to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Timeout { .. } | StorageError::Unavailable { .. }
        )
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all TALLY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TallyError {
    /// Whether the underlying failure is transient.
    pub fn is_transient(&self) -> bool {
        match self {
            TallyError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for TALLY operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
