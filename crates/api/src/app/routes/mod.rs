use axum::{routing::get, Router};

pub mod carts;
pub mod common;
pub mod news;
pub mod orders;
pub mod services;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/services", services::router())
        .nest("/news", news::router())
        .nest("/orders", orders::router())
        .merge(carts::router())
}
