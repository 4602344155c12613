use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use campusdesk_core::NewsId;
use campusdesk_infra::Workflow;
use campusdesk_orders::NewsDraft;

use super::common::{removed, respond};
use crate::app::errors;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_news).post(add_news).delete(delete_all_news))
        .route("/mine", get(list_my_news).delete(delete_my_news))
        .route(
            "/:id",
            get(get_news)
                .put(update_news)
                .patch(update_news)
                .delete(delete_news),
        )
}

pub async fn list_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, workflow.list_news(ctx.principal()).await)
}

pub async fn list_my_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, workflow.list_my_news(ctx.principal()).await)
}

pub async fn add_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<NewsDraft>,
) -> axum::response::Response {
    respond(
        StatusCode::CREATED,
        workflow.add_news(ctx.principal(), body).await,
    )
}

pub async fn get_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NewsId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, workflow.get_news(ctx.principal(), id).await)
}

pub async fn update_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<NewsDraft>,
) -> axum::response::Response {
    let id: NewsId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        workflow.update_news(ctx.principal(), id, body).await,
    )
}

pub async fn delete_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NewsId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    removed(workflow.delete_news(ctx.principal(), id).await.map(|()| 1))
}

pub async fn delete_all_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    removed(workflow.delete_all_news(ctx.principal()).await)
}

pub async fn delete_my_news(
    Extension(workflow): Extension<Workflow>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    removed(workflow.delete_my_news(ctx.principal()).await)
}
