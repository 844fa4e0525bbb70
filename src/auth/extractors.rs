//! Axum extractor for access-token authentication.
//!
//! Access tokens only. There is no silent refresh here - exchanging the
//! refresh token happens exclusively at the explicit refresh endpoint, so
//! rotation stays observable to the client.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::User;
use crate::jwt::AccessClaims;

/// Authenticated account, resolved against storage.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims from the verified access token
    pub claims: AccessClaims,
    /// The account row the token refers to
    pub user: User,
}

/// Extractor for endpoints that require authentication.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secure = state.secure_cookies();
        let fail = |kind| AuthError::new(kind, secure);

        let token = bearer_or_cookie(parts).ok_or_else(|| fail(AuthErrorKind::NotAuthenticated))?;

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| fail(AuthErrorKind::InvalidToken))?;

        let user = state
            .db()
            .users()
            .get_by_uuid(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("Failed to look up authenticated user: {}", e);
                fail(AuthErrorKind::DatabaseError)
            })?
            .ok_or_else(|| fail(AuthErrorKind::UserNotFound))?;

        Ok(Auth(AuthenticatedUser { claims, user }))
    }
}

/// Token from the Authorization header (Bearer) or the access cookie.
fn bearer_or_cookie(parts: &Parts) -> Option<&str> {
    if let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim());
            }
        }
    }
    get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
}
