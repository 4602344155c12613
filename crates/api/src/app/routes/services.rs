use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use campusdesk_core::ServiceId;
use campusdesk_infra::Workflow;
use campusdesk_orders::ServiceChanges;

use super::common::respond;
use crate::app::errors;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_services).post(add_service))
        .route(
            "/:id",
            get(get_service)
                .put(update_service)
                .patch(update_service)
                .delete(delete_service),
        )
}

pub async fn list_services(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, workflow.list_services(ctx.principal()).await)
}

pub async fn add_service(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<ServiceChanges>,
) -> axum::response::Response {
    respond(
        StatusCode::CREATED,
        workflow.add_service(ctx.principal(), body).await,
    )
}

pub async fn get_service(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ServiceId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, workflow.get_service(ctx.principal(), id).await)
}

pub async fn update_service(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ServiceChanges>,
) -> axum::response::Response {
    let id: ServiceId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow.update_service(ctx.principal(), id, body).await,
    )
}

pub async fn delete_service(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ServiceId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match workflow.delete_service(ctx.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
