//! HTTP route tests against the in-memory store.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::{json, Value};
use tally_api::{create_api_router, ApiConfig, AppState};
use tally_core::{CounterPolicy, EntityIdType, StoreOp, TenantId};
use tally_test_utils::fixtures::{repair_shop, unavailable};
use tally_test_utils::generators::arb_order_ops;
use tally_test_utils::{Fault, MockStore, Workload, CATALOG_NAMES};
use tokio::runtime::Runtime;
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn app(store: &MockStore) -> Router {
    app_with_policy(store, CounterPolicy::default())
}

fn app_with_policy(store: &MockStore, policy: CounterPolicy) -> Router {
    let state = AppState::new(store.clone(), policy);
    create_api_router(state, &ApiConfig::default())
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> TestResult<(StatusCode, Value)> {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value)?),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)?;

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, json))
}

// ============================================================================
// DRIFT AND RECONCILIATION
// ============================================================================

#[tokio::test]
async fn test_drift_reports_without_writing() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.overwrite_counter(shop.tenant_id, shop.celular, 7)?;

    let uri = format!("/api/v1/tenants/{}/counters/drift", shop.tenant_id);
    let (status, body) = send(app(&store), Method::GET, &uri, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_sync"], json!(false));
    assert_eq!(body["counters_checked"], json!(2));
    assert_eq!(body["drifted"][0]["name"], json!("CELULAR"));
    assert_eq!(body["drifted"][0]["stored"], json!(7));
    assert_eq!(body["drifted"][0]["actual"], json!(3));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(7));
    Ok(())
}

#[tokio::test]
async fn test_tenant_reconcile_repairs_counter() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.overwrite_counter(shop.tenant_id, shop.celular, 0)?;

    let uri = format!("/api/v1/tenants/{}/counters/reconcile", shop.tenant_id);
    let (status, body) = send(app(&store), Method::POST, &uri, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters_updated"], json!(1));
    assert_eq!(body["items"][0]["previous"], json!(0));
    assert_eq!(body["items"][0]["current"], json!(3));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(3));

    // Second run finds nothing to do.
    let (_, body) = send(app(&store), Method::POST, &uri, None).await?;
    assert_eq!(body["counters_updated"], json!(0));
    assert_eq!(body["counters_correct"], json!(2));
    Ok(())
}

#[tokio::test]
async fn test_reconcile_by_body_target() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.overwrite_counter(shop.tenant_id, shop.fone_de_ouvido, 4)?;

    let (status, body) = send(
        app(&store),
        Method::POST,
        "/api/v1/counters/reconcile",
        Some(json!({ "tenant_id": shop.tenant_id })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], json!(shop.tenant_id.to_string()));
    assert_eq!(body["counters_updated"], json!(1));
    assert_eq!(store.counter_of(shop.tenant_id, "FONE DE OUVIDO")?, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_reconcile_all_tenants() -> TestResult {
    let store = MockStore::new();
    let first = repair_shop(&store)?;
    let second = repair_shop(&store)?;
    store.overwrite_counter(first.tenant_id, first.celular, 10)?;
    store.overwrite_counter(second.tenant_id, second.fone_de_ouvido, 2)?;

    let (status, body) = send(
        app(&store),
        Method::POST,
        "/api/v1/counters/reconcile",
        Some(json!({ "all": true })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenants_checked"], json!(2));
    assert_eq!(body["counters_updated"], json!(2));
    assert_eq!(store.counter_of(first.tenant_id, "CELULAR")?, Some(3));
    assert_eq!(store.counter_of(second.tenant_id, "FONE DE OUVIDO")?, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_reconcile_dry_run_leaves_counters_alone() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.overwrite_counter(shop.tenant_id, shop.celular, 1)?;

    let (status, body) = send(
        app(&store),
        Method::POST,
        "/api/v1/counters/reconcile?dry_run=true",
        Some(json!({ "tenant_id": shop.tenant_id })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_sync"], json!(false));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(1));
    assert_eq!(store.call_count(StoreOp::SetCounter), 0);
    Ok(())
}

#[tokio::test]
async fn test_reconcile_requires_target() -> TestResult {
    let store = MockStore::new();

    let (status, body) = send(app(&store), Method::POST, "/api/v1/counters/reconcile", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("MISSING_FIELD"));

    let (status, body) = send(
        app(&store),
        Method::POST,
        "/api/v1/counters/reconcile",
        Some(json!({ "tenant_id": TenantId::now_v7(), "all": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_FAILED"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_tenant_id_rejected() -> TestResult {
    let store = MockStore::new();
    let (status, _) = send(app(&store), Method::GET, "/api/v1/tenants/not-a-uuid/counters/drift", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_unavailable_store_maps_to_503() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.inject(Fault::on(StoreOp::ListOrderEquipment, unavailable()));

    let uri = format!("/api/v1/tenants/{}/counters/reconcile", shop.tenant_id);
    let (status, body) = send(app(&store), Method::POST, &uri, None).await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!("SERVICE_UNAVAILABLE"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_maps_to_504() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.set_latency(Some(Duration::from_secs(5)));

    let policy = CounterPolicy {
        query_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let uri = format!("/api/v1/tenants/{}/counters/drift", shop.tenant_id);
    let (status, body) = send(app_with_policy(&store, policy), Method::GET, &uri, None).await?;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], json!("TIMEOUT"));
    Ok(())
}

// ============================================================================
// HOOKS
// ============================================================================

#[tokio::test]
async fn test_order_created_hook_increments() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;

    let uri = format!("/api/v1/tenants/{}/hooks/order-created", shop.tenant_id);
    let (status, body) = send(app(&store), Method::POST, &uri, Some(json!({ "equipment_name": "CELULAR" }))).await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], json!("updated"));
    assert_eq!(body["counters"][0]["value"], json!(4));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(4));
    Ok(())
}

#[tokio::test]
async fn test_order_created_hook_skips_missing_name() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;

    let uri = format!("/api/v1/tenants/{}/hooks/order-created", shop.tenant_id);
    let (status, body) = send(app(&store), Method::POST, &uri, Some(json!({}))).await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], json!("skipped"));
    assert_eq!(store.call_count(StoreOp::IncrementCounter), 0);
    Ok(())
}

#[tokio::test]
async fn test_order_created_hook_fails_open() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.inject(Fault::on(StoreOp::FindEquipmentByName, unavailable()));

    let uri = format!("/api/v1/tenants/{}/hooks/order-created", shop.tenant_id);
    let (status, body) = send(app(&store), Method::POST, &uri, Some(json!({ "equipment_name": "CELULAR" }))).await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], json!("failed"));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_equipment_changed_hook_recounts_both_names() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    let moved = shop.celular_orders[0];
    store.set_order_equipment(shop.tenant_id, moved, Some("FONE DE OUVIDO"))?;

    let uri = format!("/api/v1/tenants/{}/hooks/order-equipment-changed", shop.tenant_id);
    let (status, body) = send(
        app(&store),
        Method::POST,
        &uri,
        Some(json!({ "old_name": "CELULAR", "new_name": "FONE DE OUVIDO" })),
    )
    .await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["old_name"]["status"], json!("updated"));
    assert_eq!(body["old_name"]["counters"][0]["value"], json!(2));
    assert_eq!(body["new_name"]["counters"][0]["value"], json!(1));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(2));
    assert_eq!(store.counter_of(shop.tenant_id, "FONE DE OUVIDO")?, Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_rename_hook_runs_past_request_timeout() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    let moved = shop.celular_orders[0];
    store.set_order_equipment(shop.tenant_id, moved, Some("FONE DE OUVIDO"))?;
    store.set_latency(Some(Duration::from_millis(400)));

    // Six store calls at 400ms each outlast the request timeout but not the query timeout.
    let api_config = ApiConfig {
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let app = create_api_router(AppState::new(store.clone(), CounterPolicy::default()), &api_config);
    let uri = format!("/api/v1/tenants/{}/hooks/order-equipment-changed", shop.tenant_id);
    let (status, body) = send(
        app,
        Method::POST,
        &uri,
        Some(json!({ "old_name": "CELULAR", "new_name": "FONE DE OUVIDO" })),
    )
    .await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["old_name"]["status"], json!("updated"));
    assert_eq!(body["new_name"]["status"], json!("updated"));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(2));
    assert_eq!(store.counter_of(shop.tenant_id, "FONE DE OUVIDO")?, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_equipment_changed_hook_to_uncataloged_name() -> TestResult {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    let moved = shop.celular_orders[0];
    store.set_order_equipment(shop.tenant_id, moved, Some("VIDEOGAME"))?;
    let types_before = store.equipment_type_count()?;

    let uri = format!("/api/v1/tenants/{}/hooks/order-equipment-changed", shop.tenant_id);
    let (status, body) = send(
        app(&store),
        Method::POST,
        &uri,
        Some(json!({ "old_name": "CELULAR", "new_name": "VIDEOGAME" })),
    )
    .await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["new_name"]["status"], json!("not_cataloged"));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(2));
    assert_eq!(store.equipment_type_count()?, types_before);
    Ok(())
}

// ============================================================================
// HEALTH AND DOCS
// ============================================================================

#[tokio::test]
async fn test_readiness_with_memory_store() -> TestResult {
    let store = MockStore::new();
    let (status, body) = send(app(&store), Method::GET, "/health/ready", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["details"]["store"]["status"], json!("healthy"));
    Ok(())
}

#[tokio::test]
async fn test_readiness_reports_unavailable_store() -> TestResult {
    let store = MockStore::new();
    store.inject(Fault::on(StoreOp::Ping, unavailable()));

    let (status, body) = send(app(&store), Method::GET, "/health/ready", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("unhealthy"));
    Ok(())
}

#[tokio::test]
async fn test_openapi_document_served() -> TestResult {
    let store = MockStore::new();
    let (status, body) = send(app(&store), Method::GET, "/openapi.json", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/tenants/{tenant_id}/counters/drift"].is_object());
    Ok(())
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: reconciling over HTTP always leaves the tenant in sync,
    /// whatever the order history.
    #[test]
    fn prop_http_reconcile_then_drift_is_in_sync(ops in arb_order_ops(24)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let fail = |e: Box<dyn std::error::Error>| TestCaseError::fail(e.to_string());

            let store = MockStore::new();
            let mut workload = Workload::seed(&store, CATALOG_NAMES)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            for op in &ops {
                workload
                    .apply(&store, op)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let tenant_id = workload.tenant_id;
            let uri = format!("/api/v1/tenants/{}/counters/reconcile", tenant_id);
            let (status, _) = send(app(&store), Method::POST, &uri, None).await.map_err(fail)?;
            prop_assert_eq!(status, StatusCode::OK);

            let uri = format!("/api/v1/tenants/{}/counters/drift", tenant_id);
            let (status, body) = send(app(&store), Method::GET, &uri, None).await.map_err(fail)?;
            prop_assert_eq!(status, StatusCode::OK);
            prop_assert_eq!(&body["in_sync"], &json!(true));
            Ok(())
        })?;
    }
}
