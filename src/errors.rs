use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("review window expired")]
    WindowExpired,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("transaction conflict, retry the request")]
    Conflict,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("chat service error: {0}")]
    Chat(String),
}

impl AppError {
    /// Stable machine-readable code carried alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::WindowExpired => "WINDOW_EXPIRED",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::Conflict => "CONFLICT",
            AppError::Validation(_) => "VALIDATION",
            AppError::Chat(_) => "CHAT_UNAVAILABLE",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::WindowExpired => StatusCode::GONE,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Chat(_) => StatusCode::BAD_GATEWAY,
        };

        let body = serde_json::json!({ "error": self.to_string(), "code": self.code() });
        (status, axum::Json(body)).into_response()
    }
}
