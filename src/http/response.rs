//! Error responses.
//!
//! # Responsibilities
//! - Map handler failures to HTTP status codes
//! - Render the JSON error envelope `{"message", "statusCode"[, "exception"]}`
//!
//! # Design Decisions
//! - Handlers return `Result<_, ApiError>`; nothing is raised past the router
//! - Parse failures carry the parser's message as `exception`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    BadRequest {
        message: String,
        exception: Option<String>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    message: &'a str,
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            exception: None,
        }
    }

    /// A body that could not be parsed; `source` becomes the `exception` field.
    pub fn invalid_body(source: impl std::fmt::Display) -> Self {
        ApiError::BadRequest {
            message: "Invalid JSON body".to_string(),
            exception: Some(source.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let exception = match &self {
            ApiError::BadRequest { exception, .. } => exception.as_deref(),
            _ => None,
        };
        let envelope = ErrorEnvelope {
            message: &message,
            status_code: status.as_u16(),
            exception,
        };
        (status, Json(envelope)).into_response()
    }
}
