//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layers (outermost → innermost):
//! 1. Cache-Control: no-store → 2. Trace → 3. Identity (protected routes only)

use std::sync::Arc;

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with every route under `/api/`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/diseases",
            get(endpoints::diseases::list).post(endpoints::diseases::create),
        )
        .route("/diseases/:id/treatments", get(endpoints::diseases::treatments))
        .route("/operators", get(endpoints::diseases::operators))
        .route("/diagnoses", get(endpoints::diagnoses::list))
        .route("/diagnoses/:id", get(endpoints::diagnoses::detail))
        .route("/diagnoses/:id/relabel", post(endpoints::diagnoses::relabel))
        .route("/diagnoses/:id/recreate", post(endpoints::diagnoses::recreate))
        .route(
            "/recommendations",
            get(endpoints::recommendations::list).post(endpoints::recommendations::create),
        )
        .route("/recommendations/:id", get(endpoints::recommendations::detail))
        .route("/tasks", get(endpoints::tasks::list))
        .route("/tasks/:id", get(endpoints::tasks::detail))
        .route("/tasks/:id/status", post(endpoints::tasks::set_status))
        .route("/stats", get(endpoints::stats::snapshot))
        .route(
            "/reports",
            get(endpoints::reports::list).post(endpoints::reports::create),
        )
        .route("/reports/:id", get(endpoints::reports::detail))
        .route("/audit", get(endpoints::audit::list))
        .route("/audit/:table/:record_id", get(endpoints::audit::trail))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::identity::require_actor));

    // Health checks and pipeline intake carry no end-user identity.
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/diagnoses", post(endpoints::diagnoses::submit))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
