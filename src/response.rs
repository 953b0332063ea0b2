use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Envelope
///
/// The uniform body of every response: `{status: bool, data}` on success with a
/// payload, `{status: bool, message}` for plain messages and all failures.
/// `status` is true exactly when the HTTP code is 2xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// ApiResponse
///
/// A normalised outcome: the HTTP status plus its [`Envelope`]. Handlers return
/// `Result<ApiResponse<T>, ApiError>` and never build bodies by hand.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub code: StatusCode,
    pub body: Envelope<T>,
}

impl<T> ApiResponse<T> {
    pub fn with_data(code: StatusCode, data: T) -> Self {
        Self {
            code,
            body: Envelope {
                status: code.is_success(),
                data: Some(data),
                message: None,
            },
        }
    }

    /// 200 with payload.
    pub fn ok(data: T) -> Self {
        Self::with_data(StatusCode::OK, data)
    }

    /// 201 with payload.
    pub fn created(data: T) -> Self {
        Self::with_data(StatusCode::CREATED, data)
    }

    /// The payload, if this response carries one.
    pub fn into_data(self) -> Option<T> {
        self.body.data
    }
}

impl ApiResponse<()> {
    pub fn message(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            body: Envelope {
                status: code.is_success(),
                data: None,
                message: Some(message.into()),
            },
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self.body)).into_response()
    }
}
