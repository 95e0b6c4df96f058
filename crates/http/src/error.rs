//! Error handling for the bookshelf HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// Uniform body of every non-2xx response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub has_error: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        payload: serde_json::Value,
    },

    #[error("conflict: {message}")]
    Conflict {
        message: String,
        payload: serde_json::Value,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(payload: serde_json::Value, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            payload,
        }
    }

    pub fn conflict(payload: serde_json::Value, message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            payload,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `type` field, for programmatic handling by callers.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "ValidationError",
            AppError::BadRequest { .. } => "BadRequestError",
            AppError::Conflict { .. } => "ConflictError",
            AppError::NotFound { .. } => "NotFoundError",
            AppError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();
        let kind = self.kind();

        let (message, payload) = match self {
            AppError::Validation { message, payload } | AppError::Conflict { message, payload } => {
                tracing::info!(error_id = %error_id, error_type = kind, status_code = %status.as_u16(), %message, "request rejected");
                (message, Some(payload))
            }
            AppError::NotFound { message } | AppError::BadRequest { message } => {
                tracing::info!(error_id = %error_id, error_type = kind, status_code = %status.as_u16(), %message, "request rejected");
                (message, None)
            }
            AppError::Internal(e) => {
                // Store and driver details stay in the log.
                tracing::error!(error_id = %error_id, error = ?e, "internal error");
                (INTERNAL_MESSAGE.to_string(), None)
            }
        };

        let body = ErrorBody {
            message,
            has_error: true,
            kind,
            payload,
        };

        (status, Json(body)).into_response()
    }
}
