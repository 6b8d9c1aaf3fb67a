use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::scheduling::SchedulingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String, Option<serde_json::Value>),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Username or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    fn to_error_response(
        code: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                details,
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => (
                StatusCode::UNAUTHORIZED,
                ApiError::to_error_response(code, &msg, None),
            )
                .into_response(),
            ApiError::Forbidden(code, msg) => (
                StatusCode::FORBIDDEN,
                ApiError::to_error_response(code, &msg, None),
            )
                .into_response(),
            ApiError::BadRequest(code, msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::to_error_response(code, &msg, None),
            )
                .into_response(),
            ApiError::NotFound(code, msg) => (
                StatusCode::NOT_FOUND,
                ApiError::to_error_response(code, &msg, None),
            )
                .into_response(),
            ApiError::Conflict(code, msg, details) => (
                StatusCode::CONFLICT,
                ApiError::to_error_response(code, &msg, details),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg, None),
            )
                .into_response(),
        }
    }
}

/// Maps the scheduling core's rejections onto the HTTP envelope. Conflict,
/// transition and bulk rejections keep their structured payloads so the
/// frontend can act on them.
impl From<SchedulingError> for ApiError {
    fn from(e: SchedulingError) -> Self {
        let message = e.to_string();
        match e {
            SchedulingError::Validation(_) => ApiError::BadRequest("VALIDATION_ERROR", message),
            SchedulingError::Conflict { existing } => ApiError::Conflict(
                "SLOT_CONFLICT",
                message,
                existing.map(|c| json!({ "conflicting_appointment": c })),
            ),
            SchedulingError::TerminalState { .. } => {
                ApiError::Conflict("INVALID_STATUS_TRANSITION", message, None)
            }
            SchedulingError::IllegalTransition { from, .. } => ApiError::Conflict(
                "INVALID_STATUS_TRANSITION",
                message,
                Some(json!({ "legal_next_states": from.allowed_transitions() })),
            ),
            SchedulingError::NotFound => {
                ApiError::NotFound("NOT_FOUND", "appointment not found".into())
            }
            SchedulingError::BookingNotFound => {
                ApiError::NotFound("NOT_FOUND", "booking not found".into())
            }
            SchedulingError::BulkRejected { invalid_ids } => ApiError::Conflict(
                "BULK_UPDATE_REJECTED",
                message,
                Some(json!({ "invalid_ids": invalid_ids })),
            ),
            SchedulingError::Store(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}
