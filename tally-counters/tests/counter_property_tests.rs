//! Counter consistency scenarios and property tests.
//!
//! Runs the hooks and the reconciler against the in-memory store, with
//! workloads generated by `tally-test-utils`.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tally_core::{CounterPolicy, TallyResult};
use tally_counters::{
    compute_drift, on_order_created, on_order_equipment_changed, reconcile_tenant, HookOutcome,
};
use tally_test_utils::assertions::counter_mismatches;
use tally_test_utils::fixtures::repair_shop;
use tally_test_utils::generators::arb_order_ops;
use tally_test_utils::{AppliedOp, MockStore, OrderOp, Workload, CATALOG_NAMES};
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Persist a step, then fire the hook the order flow would fire.
async fn apply_with_hooks(
    store: &MockStore,
    workload: &mut Workload,
    op: &OrderOp,
) -> TallyResult<()> {
    match workload.apply(store, op)? {
        AppliedOp::Created { equipment_name } => {
            on_order_created(store, workload.tenant_id, equipment_name.as_deref()).await;
        }
        AppliedOp::Changed { old_name, new_name } => {
            on_order_equipment_changed(
                store,
                workload.tenant_id,
                old_name.as_deref(),
                new_name.as_deref(),
            )
            .await;
        }
        AppliedOp::Deleted | AppliedOp::Corrupted | AppliedOp::Noop => {}
    }
    Ok(())
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_create_fourth_order_increments_to_four() -> TallyResult<()> {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;

    store.create_order(shop.tenant_id, Some("CELULAR"))?;
    on_order_created(&store, shop.tenant_id, Some("CELULAR")).await;

    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(4));
    Ok(())
}

#[tokio::test]
async fn test_rename_moves_one_usage() -> TallyResult<()> {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;
    on_order_created(&store, shop.tenant_id, Some("CELULAR")).await;

    let old = store.set_order_equipment(
        shop.tenant_id,
        shop.celular_orders[0],
        Some("FONE DE OUVIDO"),
    )?;
    let outcome =
        on_order_equipment_changed(&store, shop.tenant_id, old.as_deref(), Some("FONE DE OUVIDO"))
            .await;

    assert!(!outcome.old_name.is_failed());
    assert!(!outcome.new_name.is_failed());
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(3));
    assert_eq!(store.counter_of(shop.tenant_id, "FONE DE OUVIDO")?, Some(1));
    assert!(counter_mismatches(&store, shop.tenant_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_corrupted_counter_reported_and_repaired() -> TallyResult<()> {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.overwrite_counter(shop.tenant_id, shop.celular, 99)?;

    let report = reconcile_tenant(&store, shop.tenant_id, &CounterPolicy::default()).await?;

    assert_eq!(report.counters_updated, 1);
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].name, "CELULAR");
    assert_eq!(report.items[0].previous, 99);
    assert_eq!(report.items[0].current, 3);
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_creates_do_not_lose_updates() -> TallyResult<()> {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;

    let (first, second) = tokio::join!(
        on_order_created(&store, shop.tenant_id, Some("CELULAR")),
        on_order_created(&store, shop.tenant_id, Some("CELULAR")),
    );

    assert!(matches!(first, HookOutcome::Updated { .. }));
    assert!(matches!(second, HookOutcome::Updated { .. }));
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(5));
    Ok(())
}

#[tokio::test]
async fn test_lost_update_healed_by_reconcile() -> TallyResult<()> {
    let store = MockStore::new();
    let shop = repair_shop(&store)?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;
    store.create_order(shop.tenant_id, Some("CELULAR"))?;
    // Two racing read-modify-write creates both read 3 and write 4.
    store.overwrite_counter(shop.tenant_id, shop.celular, 4)?;

    let drift = compute_drift(&store, shop.tenant_id, &CounterPolicy::default()).await?;
    assert!(!drift.in_sync);

    let report = reconcile_tenant(&store, shop.tenant_id, &CounterPolicy::default()).await?;
    assert_eq!(report.items[0].previous, 4);
    assert_eq!(store.counter_of(shop.tenant_id, "CELULAR")?, Some(5));
    Ok(())
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after any create/edit/delete/corrupt sequence, one
    /// reconciliation makes every counter equal its order count and a
    /// second reconciliation writes nothing.
    #[test]
    fn prop_reconcile_converges_and_is_idempotent(ops in arb_order_ops(40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = MockStore::new();
            let mut workload = Workload::seed(&store, CATALOG_NAMES)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            for op in &ops {
                apply_with_hooks(&store, &mut workload, op)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let policy = CounterPolicy::default();
            reconcile_tenant(&store, workload.tenant_id, &policy)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let mismatches = counter_mismatches(&store, workload.tenant_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(mismatches.is_empty(), "mismatches after reconcile: {:?}", mismatches);

            let second = reconcile_tenant(&store, workload.tenant_id, &policy)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(second.counters_updated, 0);
            prop_assert!(second.items.is_empty());
            Ok(())
        })?;
    }

    /// Property: without out-of-band writes, sequential hooks alone keep
    /// every counter exact.
    #[test]
    fn prop_sequential_hooks_preserve_counts(ops in arb_order_ops(40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = MockStore::new();
            let mut workload = Workload::seed(&store, CATALOG_NAMES)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let hooked = ops.iter().filter(|op| {
                matches!(op, OrderOp::Create { .. } | OrderOp::ChangeEquipment { .. })
            });
            for op in hooked {
                apply_with_hooks(&store, &mut workload, op)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let drift = compute_drift(&store, workload.tenant_id, &CounterPolicy::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(drift.in_sync, "drift without out-of-band writes: {:?}", drift.drifted);
            Ok(())
        })?;
    }

    /// Property: orphan names never create catalog entries.
    #[test]
    fn prop_orphans_never_create_types(ops in arb_order_ops(30)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = MockStore::new();
            let mut workload = Workload::seed(&store, CATALOG_NAMES)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            for op in &ops {
                apply_with_hooks(&store, &mut workload, op)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            let report = reconcile_tenant(&store, workload.tenant_id, &CounterPolicy::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(
                store.equipment_type_count().map_err(|e| TestCaseError::fail(e.to_string()))?,
                CATALOG_NAMES.len()
            );
            for orphan in &report.orphans {
                prop_assert!(!CATALOG_NAMES.contains(&orphan.name.as_str()));
            }
            Ok(())
        })?;
    }
}
