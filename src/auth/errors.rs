//! Authentication error types.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie};

/// Internal auth error kind used by the extractor.
#[derive(Debug)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    UserNotFound,
    DatabaseError,
}

/// Authentication failure response: the standard error envelope with 401
/// (500 for storage faults), clearing both session cookies.
#[derive(Debug)]
pub struct AuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl AuthError {
    pub(super) fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "unauthorized request",
            AuthErrorKind::InvalidToken => "invalid or expired access token",
            AuthErrorKind::UserNotFound => "invalid access token",
            AuthErrorKind::DatabaseError => "internal server error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = crate::api::error_body(status, self.message());

        let mut response = (status, Json(body)).into_response();

        // Clear both cookies so a client with a dead session stops retrying
        let headers = response.headers_mut();
        for cleared in [
            clear_cookie(ACCESS_COOKIE_NAME, self.secure_cookies),
            clear_cookie(REFRESH_COOKIE_NAME, self.secure_cookies),
        ] {
            if let Ok(value) = header::HeaderValue::from_str(&cleared) {
                headers.append(header::SET_COOKIE, value);
            }
        }

        response
    }
}
