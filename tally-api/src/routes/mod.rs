//! REST API Routes Module
//!
//! Includes:
//! - Counter reconciliation and drift reports
//! - Order lifecycle hooks that keep counters current
//! - Health check endpoints (Kubernetes-compatible)

pub mod counters;
pub mod health;
pub mod hooks;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::API_PREFIX;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub use counters::create_router as counters_router;
pub use health::create_router as health_router;
pub use hooks::create_router as hooks_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the complete application router.
///
/// Counter and hook routes are bounded per store call by `TimedStore`, so
/// only health and docs sit under the whole-request `TimeoutLayer`. A hook
/// must always run to its outcome.
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .merge(counters::create_router())
        .merge(hooks::create_router());

    let bounded_routes = Router::new()
        .nest("/health", health::create_router())
        .route("/openapi.json", get(openapi_json))
        .layer(TimeoutLayer::new(api_config.request_timeout));

    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest(API_PREFIX, api_routes)
        .merge(bounded_routes);

    // Add Swagger UI if swagger-ui feature is enabled
    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router.with_state(state).layer(TraceLayer::new_for_http())
}
