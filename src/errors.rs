use crate::services::{
    StoreError,
    lifecycle::SubmitError,
    listing_repository::RepositoryError,
    profile_service::ProfileError,
};
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => AppError::not_found(err.to_string()),
            RepositoryError::MissingUserId => AppError::bad_request(err.to_string()),
            RepositoryError::Store { source, .. } => source.into(),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        let status = match &err {
            SubmitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SubmitError::Forbidden(_) => StatusCode::FORBIDDEN,
            SubmitError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            SubmitError::Repository(RepositoryError::MissingUserId) => StatusCode::BAD_REQUEST,
            SubmitError::Upload(_) | SubmitError::Delete(_) => StatusCode::BAD_GATEWAY,
            SubmitError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SubmitError::NotEditing | SubmitError::SessionClosed => StatusCode::CONFLICT,
        };
        AppError::new(status, err.user_message())
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::MissingField(_) | ProfileError::EmptyMessage => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ProfileError::UsernameTaken(_) | ProfileError::AlreadyExists(_) => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            ProfileError::NotFound(_) => AppError::not_found(err.to_string()),
            ProfileError::Listing(err) => err.into(),
            ProfileError::Store { source, .. } => source.into(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), err.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(format!("invalid listing payload: {}", err))
    }
}
