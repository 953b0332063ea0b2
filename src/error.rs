use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Message sent in place of any non-public error.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again later.";

/// StoreError
///
/// Failures raised by an Entity Store driver. Driver text stays inside
/// `Database` and is only ever logged, never returned to a client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (e.g. an active username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write referenced an entity that does not exist or is soft-deleted.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A stored row could not be mapped back to a domain record.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ApiError
///
/// The single typed failure every operation returns. `is_public = false`
/// marks unexpected failures: their message is logged and replaced with
/// [`GENERIC_FAILURE_MESSAGE`] before it reaches the caller.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub is_public: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            is_public: true,
        }
    }

    /// 401: missing, malformed, expired or otherwise rejected credentials.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403: authenticated, but the role or ownership check failed.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 404: absent or soft-deleted.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 400: the write points at a missing or soft-deleted entity.
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 422: request-shape validation.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500, never shown to the client.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: detail.into(),
            is_public: false,
        }
    }

    /// 500 that the caller is allowed to see. Used when a cascade stopped
    /// after the owning entity was already deleted.
    pub fn partial_cascade(entity: &str, step: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{entity} was deleted but '{step}' did not complete"),
        )
    }

    /// 500 that the caller is allowed to see. Used when a record was written
    /// but linking it into its owners' reference sets failed.
    pub fn partial_create(entity: &str, step: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{entity} was created but '{step}' did not complete"),
        )
    }

    /// Status and message as the client will see them.
    pub fn public_parts(&self) -> (StatusCode, &str) {
        if self.is_public {
            (self.status, &self.message)
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE)
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::InvalidReference(msg) => ApiError::invalid_reference(msg),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !self.is_public {
            tracing::error!(status = %self.status, detail = %self.message, "request failed");
        } else if self.status.is_server_error() {
            tracing::warn!(status = %self.status, message = %self.message, "request failed");
        }

        let (status, message) = self.public_parts();
        ApiResponse::<()>::message(status, message).into_response()
    }
}
