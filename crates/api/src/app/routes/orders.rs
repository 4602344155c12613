use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use campusdesk_core::OrderId;
use campusdesk_infra::Workflow;
use campusdesk_orders::{OrderDraft, OrderPatch};

use super::common::respond;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(add_order))
        .route(
            "/:id",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/:id/status", patch(change_status))
        .route("/:id/cancel", patch(cancel_order))
}

pub async fn list_orders(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::OrderListQuery>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        workflow.list_orders(ctx.principal(), query.status).await,
    )
}

pub async fn add_order(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<OrderDraft>,
) -> axum::response::Response {
    respond(
        StatusCode::CREATED,
        workflow.add_order(ctx.principal(), body).await,
    )
}

pub async fn get_order(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, workflow.get_order(ctx.principal(), id).await)
}

pub async fn update_order(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<OrderPatch>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow.update_order(ctx.principal(), id, body).await,
    )
}

pub async fn delete_order(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match workflow.delete_order(ctx.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusChangeRequest>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow
            .change_status(ctx.principal(), id, body.status, body.reason)
            .await,
    )
}

pub async fn cancel_order(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow
            .cancel_order(ctx.principal(), id, body.cancel_reason)
            .await,
    )
}
