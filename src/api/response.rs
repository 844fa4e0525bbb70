//! Standard success envelope:
//! `{"statusCode": n, "data": ..., "message": "...", "success": true}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    data: T,
    message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            data,
            message: message.into(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

#[derive(Serialize)]
struct ResponseBody<T: Serialize> {
    #[serde(rename = "statusCode")]
    status_code: u16,
    data: T,
    message: String,
    success: bool,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = ResponseBody {
            status_code: self.status.as_u16(),
            data: self.data,
            message: self.message,
            success: true,
        };
        (self.status, Json(body)).into_response()
    }
}
