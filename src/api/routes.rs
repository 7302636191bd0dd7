//! Router assembly for the studio API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::AppState;

/// Build the application router. CORS is permissive because the browser UI
/// is served from its own origin during development.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/catalog", get(handlers::get_catalog))
        .route(
            "/v1/credentials",
            get(handlers::get_credentials).post(handlers::install_credential),
        )
        .route("/v1/sessions", post(handlers::create_session))
        .route(
            "/v1/sessions/current",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/v1/sessions/current/looks/:look_id/retry",
            post(handlers::retry_look),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
