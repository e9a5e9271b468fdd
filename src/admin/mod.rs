//! Admin HTTP API.
//!
//! # Routes
//! ```text
//! GET    /admin/status                 pool summary
//! GET    /admin/endpoints              per-endpoint snapshot
//! DELETE /admin/endpoints/{id}         deregister (409 while leased)
//! POST   /admin/endpoints/{id}/drain   force-expire outstanding leases
//! ```
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;

pub use self::handlers::AdminState;

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/endpoints", get(get_endpoints))
        .route("/admin/endpoints/{id}", delete(deregister_endpoint))
        .route("/admin/endpoints/{id}/drain", post(drain_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
