//! OpenAPI Specification for TALLY API
//!
//! Generated with utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::counters::{ReconcileRequest, ReconcileResponse};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::hooks::{EquipmentChangedRequest, OrderCreatedRequest};
use crate::routes::{counters, health, hooks};

use tally_core::{EquipmentTypeId, TenantId};
use tally_counters::{
    BatchDriftReport, BatchReconcileReport, CounterComparison, CounterValue, DriftReport,
    EquipmentChangeOutcome, HookOutcome, ItemStatus, OrphanName, ReconcileItem, ReconcileReport,
    TenantFailure,
};

/// OpenAPI document for TALLY API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TALLY API",
        version = "0.1.0",
        description = "Equipment usage counter maintenance for multi-tenant repair shops",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "https://tally.caliber.run", description = "Production"),
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Counters", description = "Reconciliation and drift reports"),
        (name = "Hooks", description = "Order lifecycle hooks that keep counters current"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === Counter Routes ===
        counters::reconcile,
        counters::reconcile_tenant_counters,
        counters::tenant_drift,

        // === Hook Routes ===
        hooks::order_created,
        hooks::order_equipment_changed,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // Identifiers
            TenantId,
            EquipmentTypeId,

            // Reconciliation
            ReconcileRequest,
            ReconcileResponse,
            ReconcileReport,
            ReconcileItem,
            ItemStatus,
            BatchReconcileReport,
            TenantFailure,

            // Drift
            DriftReport,
            BatchDriftReport,
            CounterComparison,
            OrphanName,

            // Hooks
            OrderCreatedRequest,
            EquipmentChangedRequest,
            HookOutcome,
            CounterValue,
            EquipmentChangeOutcome,

            // Health
            HealthResponse,
            HealthStatus,
            HealthDetails,
            ComponentHealth,

            // Errors
            ApiError,
            ErrorCode,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON document.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
