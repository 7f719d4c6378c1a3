use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message returned for a memory that does not exist or belongs to someone else.
pub const NOT_FOUND_OR_NOT_OWNER: &str = "Memory is not found or not your own.";

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0:?}")]
    Validation(Vec<String>),

    /// Covers both a missing row and a row owned by another user.
    #[error("{}", NOT_FOUND_OR_NOT_OWNER)]
    NotFoundOrNotOwner,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    JsonBody(#[from] JsonRejection),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Error message payload: a single reason or a list of field messages
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    List(Vec<String>),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: ErrorMessage,
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, ErrorMessage) {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorMessage::Text("Database error".to_string()),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized request: {}", msg);
                (StatusCode::UNAUTHORIZED, ErrorMessage::Text(msg.clone()))
            }
            AppError::Validation(messages) => {
                (StatusCode::BAD_REQUEST, ErrorMessage::List(messages.clone()))
            }
            AppError::NotFoundOrNotOwner => (
                StatusCode::BAD_REQUEST,
                ErrorMessage::Text(NOT_FOUND_OR_NOT_OWNER.to_string()),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorMessage::Text(msg.clone())),
            AppError::JsonBody(rejection) => (rejection.status(), ErrorMessage::Text(rejection.body_text())),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorMessage::Text(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorMessage::Text(msg.clone()))
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorMessage::Text("IO error".to_string()),
                )
            }
            AppError::Request(e) => {
                tracing::error!("Request error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorMessage::Text("External request error".to_string()),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message,
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
