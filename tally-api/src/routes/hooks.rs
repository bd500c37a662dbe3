//! Order Lifecycle Hook Routes
//!
//! Called by the order service after an order row has been persisted. The
//! counter update never fails the caller: store problems surface as a
//! `failed` outcome in a 202 response and are repaired by reconciliation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tally_core::TenantId;
use tally_counters::{
    on_order_created, on_order_equipment_changed, EquipmentChangeOutcome, HookOutcome,
};

use crate::state::AppState;

/// Body of the order-created hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderCreatedRequest {
    /// Equipment name copied onto the new order, if any.
    #[serde(default)]
    pub equipment_name: Option<String>,
}

/// Body of the order-equipment-changed hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EquipmentChangedRequest {
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

/// POST /api/v1/tenants/{tenant_id}/hooks/order-created
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/hooks/order-created",
    tag = "Hooks",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant ID")
    ),
    request_body = OrderCreatedRequest,
    responses(
        (status = 202, description = "Hook processed, see outcome", body = HookOutcome),
    ),
)]
pub async fn order_created(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
    Json(req): Json<OrderCreatedRequest>,
) -> impl IntoResponse {
    let outcome = on_order_created(&*state.store, tenant_id, req.equipment_name.as_deref()).await;
    (StatusCode::ACCEPTED, Json(outcome))
}

/// POST /api/v1/tenants/{tenant_id}/hooks/order-equipment-changed
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/hooks/order-equipment-changed",
    tag = "Hooks",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant ID")
    ),
    request_body = EquipmentChangedRequest,
    responses(
        (status = 202, description = "Hook processed, see outcome", body = EquipmentChangeOutcome),
    ),
)]
pub async fn order_equipment_changed(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
    Json(req): Json<EquipmentChangedRequest>,
) -> impl IntoResponse {
    let outcome = on_order_equipment_changed(
        &*state.store,
        tenant_id,
        req.old_name.as_deref(),
        req.new_name.as_deref(),
    )
    .await;
    (StatusCode::ACCEPTED, Json(outcome))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/tenants/:tenant_id/hooks/order-created", post(order_created))
        .route(
            "/tenants/:tenant_id/hooks/order-equipment-changed",
            post(order_equipment_changed),
        )
}
