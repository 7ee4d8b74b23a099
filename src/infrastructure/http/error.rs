//! HTTP Error Handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const UNPROCESSABLE: i32 = 422;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
///
/// errno 与 HTTP 状态码一致
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unprocessable(String),
    Internal(String),
    Conflict(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = match &self {
            ApiError::NotFound(msg) => {
                tracing::warn!(errno = errno::NOT_FOUND, error = %msg, "Resource not found");
                ErrorResponse::new(errno::NOT_FOUND, msg.clone())
            }
            ApiError::Unprocessable(msg) => {
                tracing::warn!(errno = errno::UNPROCESSABLE, error = %msg, "Invalid request");
                ErrorResponse::new(errno::UNPROCESSABLE, msg.clone())
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno = errno::INTERNAL_ERROR, error = %msg, "Internal server error");
                ErrorResponse::new(errno::INTERNAL_ERROR, msg.clone())
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(errno = errno::CONFLICT, error = %msg, "Resource conflict");
                ErrorResponse::new(errno::CONFLICT, msg.clone())
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!(errno = errno::SERVICE_UNAVAILABLE, error = %msg, "Service unavailable");
                ErrorResponse::new(errno::SERVICE_UNAVAILABLE, msg.clone())
            }
        };

        (status, Json(response)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let msg = e.to_string();
        match e {
            ApplicationError::Configuration(_) | ApplicationError::ResourceBusy(_) => {
                ApiError::ServiceUnavailable(msg)
            }
            ApplicationError::ValidationError(_) => ApiError::Unprocessable(msg),
            ApplicationError::DuplicateTask(_) | ApplicationError::InvalidState(_) => {
                ApiError::Conflict(msg)
            }
            ApplicationError::NotFound(_) => ApiError::NotFound(msg),
            ApplicationError::Execution(_) | ApplicationError::InternalError(_) => {
                ApiError::Internal(msg)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_status_mapping() {
        let cases = [
            (ApplicationError::configuration("off"), StatusCode::SERVICE_UNAVAILABLE),
            (ApplicationError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApplicationError::ResourceBusy("busy".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApplicationError::DuplicateTask("t1".to_string()),
                StatusCode::CONFLICT,
            ),
            (ApplicationError::invalid_state("running"), StatusCode::CONFLICT),
            (
                ApplicationError::NotFound("t1".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (ApplicationError::execution("oom"), StatusCode::INTERNAL_SERVER_ERROR),
            (ApplicationError::internal("bug"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
