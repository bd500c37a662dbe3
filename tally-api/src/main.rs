//! TALLY API Server Entry Point
//!
//! Bootstraps configuration, selects the store backend, spawns the
//! reconciliation sweep and starts the Axum HTTP server.

use tally_api::{
    create_api_router, init_tracing, reconcile_sweep_task, ApiConfig, ApiError, ApiResult,
    AppState, DbClient, DbConfig, ReconcileJobConfig, StoreBackend, TelemetryConfig,
};
use tally_core::CounterPolicy;
use tally_storage::MockStore;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env()?;
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let policy = CounterPolicy::from_env();
    policy.validate()?;

    let state = match api_config.store {
        StoreBackend::Postgres => {
            let db = DbClient::from_config(&DbConfig::from_env())?;
            if api_config.migrate_on_start {
                db.apply_schema().await?;
            }
            AppState::new(db, policy)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, all data is lost on restart");
            AppState::new(MockStore::new(), policy)
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_config = ReconcileJobConfig::from_env();
    let sweep = if job_config.enabled {
        Some(tokio::spawn(reconcile_sweep_task(
            state.store.clone(),
            state.policy.clone(),
            job_config,
            shutdown_rx,
        )))
    } else {
        tracing::info!("Reconciliation sweep disabled");
        None
    };

    let app = create_api_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, store = %api_config.store, "Starting TALLY API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reconciliation sweep task failed");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
