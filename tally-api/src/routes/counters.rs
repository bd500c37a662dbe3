//! Counter Reconciliation and Drift Routes
//!
//! Operator-facing endpoints for repairing and inspecting usage counters.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tally_core::TenantId;
use tally_counters::{
    compute_drift, compute_drift_all, reconcile_all, reconcile_tenant, BatchDriftReport,
    BatchReconcileReport, DriftReport, ReconcileReport,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Body of `POST /counters/reconcile`. Exactly one of `tenant_id` or
/// `all: true` must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconcileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTarget {
    Tenant(TenantId),
    All,
}

impl ReconcileRequest {
    pub fn target(&self) -> ApiResult<ReconcileTarget> {
        match (self.tenant_id, self.all) {
            (Some(tenant_id), false) => Ok(ReconcileTarget::Tenant(tenant_id)),
            (None, true) => Ok(ReconcileTarget::All),
            (Some(_), true) => Err(ApiError::validation_failed(
                "Specify either tenant_id or all, not both",
            )),
            (None, false) => Err(ApiError::missing_field("tenant_id")),
        }
    }
}

/// Query parameters for `POST /counters/reconcile`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReconcileParams {
    /// Report drift without writing any counter.
    #[serde(default)]
    pub dry_run: bool,
}

/// Result of `POST /counters/reconcile`, shaped by target and `dry_run`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum ReconcileResponse {
    Tenant(ReconcileReport),
    Batch(BatchReconcileReport),
    TenantDrift(DriftReport),
    BatchDrift(BatchDriftReport),
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/counters/reconcile - Reconcile one tenant or every tenant
#[utoipa::path(
    post,
    path = "/api/v1/counters/reconcile",
    tag = "Counters",
    params(
        ("dry_run" = Option<bool>, Query, description = "Report drift without writing")
    ),
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation (or dry-run drift) report", body = ReconcileResponse),
        (status = 400, description = "Neither or both of tenant_id and all given", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError),
        (status = 504, description = "Store call timed out", body = ApiError),
    ),
)]
pub async fn reconcile(
    State(state): State<AppState>,
    Query(params): Query<ReconcileParams>,
    Json(req): Json<ReconcileRequest>,
) -> ApiResult<Json<ReconcileResponse>> {
    let store = &*state.store;
    let policy = &state.policy;

    let response = match (req.target()?, params.dry_run) {
        (ReconcileTarget::Tenant(tenant_id), false) => {
            ReconcileResponse::Tenant(reconcile_tenant(store, tenant_id, policy).await?)
        }
        (ReconcileTarget::All, false) => ReconcileResponse::Batch(reconcile_all(store, policy).await?),
        (ReconcileTarget::Tenant(tenant_id), true) => {
            ReconcileResponse::TenantDrift(compute_drift(store, tenant_id, policy).await?)
        }
        (ReconcileTarget::All, true) => {
            ReconcileResponse::BatchDrift(compute_drift_all(store, policy).await?)
        }
    };

    Ok(Json(response))
}

/// POST /api/v1/tenants/{tenant_id}/counters/reconcile - Reconcile one tenant
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/counters/reconcile",
    tag = "Counters",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant ID")
    ),
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 503, description = "Store unavailable", body = ApiError),
        (status = 504, description = "Store call timed out", body = ApiError),
    ),
)]
pub async fn reconcile_tenant_counters(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
) -> ApiResult<Json<ReconcileReport>> {
    let report = reconcile_tenant(&*state.store, tenant_id, &state.policy).await?;
    Ok(Json(report))
}

/// GET /api/v1/tenants/{tenant_id}/counters/drift - Report drift without writing
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/counters/drift",
    tag = "Counters",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant ID")
    ),
    responses(
        (status = 200, description = "Drift report", body = DriftReport),
        (status = 503, description = "Store unavailable", body = ApiError),
        (status = 504, description = "Store call timed out", body = ApiError),
    ),
)]
pub async fn tenant_drift(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
) -> ApiResult<Json<DriftReport>> {
    let report = compute_drift(&*state.store, tenant_id, &state.policy).await?;
    Ok(Json(report))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/counters/reconcile", post(reconcile))
        .route(
            "/tenants/:tenant_id/counters/reconcile",
            post(reconcile_tenant_counters),
        )
        .route("/tenants/:tenant_id/counters/drift", get(tenant_drift))
}
