use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use votalloween_shared::protocol::ErrorBody;
use votalloween_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed input, including rejected image types.
    #[error("{0}")]
    Validation(String),

    #[error("Image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    /// The device has already voted.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Replace the message of a `NotFound` with a resource-specific one.
    pub fn or_not_found(self, message: &str) -> Self {
        match self {
            Self::NotFound(_) => Self::NotFound(message.to_string()),
            other => other,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(err.to_string()),
            StoreError::AlreadyVoted => Self::Conflict(err.to_string()),
            ref e if e.is_validation() => Self::Validation(err.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) | ServerError::ImageTooLarge { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::Conflict(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Storage(_) => {
                tracing::error!(error = %self, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ServerError::Archive(_) => {
                tracing::error!(error = %self, "archive failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to build photo archive".to_string(),
                )
            }
            ServerError::Internal(_) => {
                tracing::error!(error = %self, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
