use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};

use campusdesk_core::CartId;
use campusdesk_infra::Workflow;
use campusdesk_orders::CartPatch;

use super::common::respond;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/cart", get(get_cart).patch(update_cart))
        .route("/cart/place", post(place_cart))
        .route("/carts/:id/accept", patch(accept_cart))
        .route("/carts/:id/complete", patch(complete_cart))
        .route("/carts/:id/cancel", patch(cancel_cart))
}

pub async fn get_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, workflow.get_cart(ctx.principal()).await)
}

pub async fn update_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<CartPatch>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        workflow.update_cart(ctx.principal(), body).await,
    )
}

pub async fn place_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, workflow.place_cart(ctx.principal()).await)
}

pub async fn accept_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, workflow.accept_cart(ctx.principal(), id).await)
}

pub async fn complete_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow.complete_cart(ctx.principal(), id).await,
    )
}

pub async fn cancel_cart(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow
            .cancel_cart(ctx.principal(), id, body.cancel_reason)
            .await,
    )
}
