use core::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campusdesk_core::DomainError;
use campusdesk_infra::WorkflowError;

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        WorkflowError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", message),
        WorkflowError::FieldNotWritable(_) => {
            json_error(StatusCode::FORBIDDEN, "field_not_writable", message)
        }
        WorkflowError::NotOwner => json_error(StatusCode::FORBIDDEN, "not_owner", message),
        WorkflowError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        WorkflowError::InvalidTransition(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", message)
        }
        WorkflowError::Validation(_) => {
            json_error(StatusCode::PRECONDITION_FAILED, "validation_error", message)
        }
        WorkflowError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        WorkflowError::Store(_) | WorkflowError::Serialization(_) => {
            tracing::error!(error = %message, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
        WorkflowError::Mail(_) => {
            tracing::error!(error = %message, "mail delivery failed");
            json_error(StatusCode::BAD_GATEWAY, "mail_error", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path identifier, answering 400 when it is malformed.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
