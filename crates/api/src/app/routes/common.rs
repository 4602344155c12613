use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value as JsonValue};

use campusdesk_infra::WorkflowResult;

use crate::app::errors;

/// Render a workflow result: the filtered body on success, a JSON error
/// otherwise.
pub fn respond(status: StatusCode, result: WorkflowResult<JsonValue>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Render a delete that may remove several records as the removed count.
pub fn removed(result: WorkflowResult<usize>) -> axum::response::Response {
    respond(StatusCode::OK, result.map(|deleted| json!({ "deleted": deleted })))
}
