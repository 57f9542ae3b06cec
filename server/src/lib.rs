//! Tonegate HTTP API.
//!
//! Thin axum layer over the entitlement resolver, device registry,
//! ticket issuer, and delivery engine. Authentication happens upstream;
//! the subject arrives in the `X-User-Id` header.

mod error;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, ServerConfig};

use axum::routing::{delete, get, post};
use axum::Router;

/// Builds the API router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/downloads/request", post(routes::downloads::request))
        .route("/api/v1/downloads/{id}", get(routes::downloads::redeem))
        .route("/api/v1/downloads/complete", post(routes::downloads::complete))
        .route("/api/v1/devices/register", post(routes::devices::register))
        .route("/api/v1/devices/heartbeat", post(routes::devices::heartbeat))
        .route("/api/v1/devices/{uuid}", delete(routes::devices::revoke))
        .route(
            "/api/v1/entitlements/summary",
            get(routes::entitlements::summary),
        )
        .with_state(state)
}
