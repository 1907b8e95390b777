use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failures surfaced by the storage subsystem.
///
/// Every variant is recoverable at the call site; the HTTP boundary maps
/// them onto distinct status codes through [`AppError`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to find archive `{0}`")]
    NotFound(String),
    #[error("storage has not been initialized")]
    Uninitialized,
    #[error("modifications to initialized storage are not allowed")]
    AlreadyInitialized,
    #[error("object id `{0}` is not valid")]
    InvalidId(String),
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("crypto failure: {0}")]
    Crypto(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True for the conditions a reader should see as "no such archive".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::InvalidId(_))
    }
}

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

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
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

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            // Invalid ids read as missing so probing never learns more than a 404.
            StoreError::NotFound(_) | StoreError::InvalidId(_) => {
                AppError::not_found("unable to find archive with such key")
            }
            StoreError::Decode(_) => AppError::bad_request(err.to_string()),
            StoreError::Uninitialized => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            StoreError::AlreadyInitialized
            | StoreError::Encode(_)
            | StoreError::Crypto(_)
            | StoreError::Io(_) => {
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
