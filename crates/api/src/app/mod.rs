//! HTTP API application wiring (Axum router + workflow wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use campusdesk_infra::Workflow;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(workflow: Workflow, jwt_secret: &[u8], jwt_issuer: impl Into<String>) -> Router {
    let auth_state = middleware::AuthState::new(jwt_secret, jwt_issuer, workflow.clone());

    // Protected routes: require a bearer token naming a known, active user.
    let protected = routes::router()
        .layer(Extension(workflow))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
