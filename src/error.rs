//! Application error taxonomy and its HTTP mapping.

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result alias used by the repository, storage and handler layers.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// The addressed exhibit, article or user does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Missing, malformed, forged or expired bearer token, or a token whose
    /// subject no longer resolves to an account.
    #[error("Could not validate credentials")]
    InvalidToken,

    /// The caller is authenticated but their role does not allow the action.
    #[error("{0}")]
    Forbidden(String),

    #[error("Login already registered: {0}")]
    DuplicateLogin(String),

    #[error("Incorrect login or password")]
    BadCredentials,

    /// Request payload is missing a part or carries an unusable value.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::DuplicateLogin(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_LOGIN"),
            AppError::BadCredentials => (StatusCode::BAD_REQUEST, "BAD_CREDENTIALS"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Multipart(_) => (StatusCode::BAD_REQUEST, "MULTIPART_ERROR"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            AppError::PasswordHash(_) => (StatusCode::INTERNAL_SERVER_ERROR, "HASH_ERROR"),
            AppError::Token(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

// Extractor rejections become validation errors so malformed requests get the
// same JSON body as every other 4xx.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Server-side failures keep their details in the log, not in the body.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = code, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, code = code, "Request rejected");
            self.to_string()
        };

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }

        (status, body).into_response()
    }
}
