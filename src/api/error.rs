//! Shared error handling for API endpoints.
//!
//! Every domain failure becomes the standard error envelope:
//! `{"statusCode": n, "message": "...", "success": false, "errors": []}`.
//! Internal detail (storage, hashing, token encoding) is logged, never
//! echoed to the caller.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
    fn internal_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
    fn internal_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!("{}: {}", msg, e);
            ApiError::Internal(msg.to_string())
        })
    }
}

/// API error taxonomy with automatic envelope conversion.
pub enum ApiError {
    /// Malformed or missing required input (400)
    Validation(String),
    /// Missing/invalid/expired/reused credentials or refresh token (401)
    Authentication(String),
    /// Referenced account does not exist (404)
    NotFound(String),
    /// Uniqueness violation on username/email (409)
    Conflict(String),
    /// Unexpected storage or upload failure (500)
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("database error".into())
    }
}

/// Standard error envelope.
#[derive(Serialize)]
pub struct ErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

/// Build the error envelope for a status/message pair.
pub fn error_body(status: StatusCode, message: impl Into<String>) -> ErrorBody {
    ErrorBody {
        status_code: status.as_u16(),
        message: message.into(),
        success: false,
        errors: Vec::new(),
    }
}

/// JSON body extractor that answers malformed input with the standard error
/// envelope (400) instead of axum's default rejection.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(error_body(status, message))).into_response()
    }
}
