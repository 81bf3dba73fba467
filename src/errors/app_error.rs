use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::envelope::ApiResponse;
use crate::error::InvocationError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model timed out: {0}")]
    ModelTimeout(String),

    #[error("Response schema violation: {0}")]
    SchemaViolation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ModelTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::SchemaViolation(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::SchemaViolation(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<InvocationError> for AppError {
    fn from(err: InvocationError) -> Self {
        match err {
            InvocationError::Timeout(_) => AppError::ModelTimeout(err.to_string()),
            other => AppError::ModelUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::SchemaViolation(detail) => {
                tracing::error!(detail = %detail, "Handler output violated its response contract")
            }
            AppError::Internal(detail) => tracing::error!(detail = %detail, "Internal failure"),
            AppError::ModelUnavailable(_) | AppError::ModelTimeout(_) => {
                tracing::warn!(status = status.as_u16(), "{}", self)
            }
            _ => tracing::debug!(status = status.as_u16(), "{}", self),
        }

        let body = ApiResponse::<()>::failure(status, self.public_message());
        (status, Json(body)).into_response()
    }
}
