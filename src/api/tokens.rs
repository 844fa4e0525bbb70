//! Session lifecycle endpoints.
//!
//! - POST `/refresh` - exchange the refresh token for a new token pair,
//!   rotating the stored session value and detecting replay
//! - POST `/logout` - clear the stored session and both cookies

use axum::{
    Router,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::response::ApiResponse;
use super::users::issue_token_pair;
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, HasAuthBackend, REFRESH_COOKIE_NAME, clear_cookie, get_cookie,
};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(TokensState);

pub fn router(state: TokensState) -> Router {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairData {
    access_token: String,
    refresh_token: String,
}

/// The rotation protocol. Signature validity alone is not enough: the
/// presented token must still be the stored session value. A validly signed
/// token that no longer matches was already rotated out - treating it as
/// replay is what makes a stolen refresh token single-use.
async fn refresh(
    State(state): State<TokensState>,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, body) = request.into_parts();

    // Cookie first, then request body for non-cookie clients
    let presented = match get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        Some(token) => token.to_string(),
        None => {
            let bytes = axum::body::to_bytes(body, 64 * 1024)
                .await
                .map_err(|_| ApiError::authentication("unauthorized request"))?;
            serde_json::from_slice::<RefreshRequest>(&bytes)
                .unwrap_or_default()
                .refresh_token
                .ok_or_else(|| ApiError::authentication("unauthorized request"))?
        }
    };

    let claims = state
        .jwt
        .validate_refresh_token(&presented)
        .map_err(|_| ApiError::authentication("invalid or expired refresh token"))?;

    let user = state
        .db
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .db_err("Failed to look up account")?
        .ok_or_else(|| ApiError::authentication("invalid refresh token"))?;

    let (access_token, refresh_token, cookies) =
        issue_token_pair(&state.jwt, &user, state.secure_cookies)?;

    // Atomic compare-and-swap on the stored value; a concurrent refresh or a
    // replayed stale token loses here without touching the stored session.
    let rotated = state
        .db
        .sessions()
        .rotate(user.id, &presented, &refresh_token)
        .await
        .db_err("Failed to rotate session")?;

    if !rotated {
        return Err(ApiError::authentication("refresh token is used or expired"));
    }

    Ok((
        AppendHeaders(cookies),
        ApiResponse::ok(
            TokenPairData {
                access_token,
                refresh_token,
            },
            "access token refreshed",
        ),
    ))
}

async fn logout(
    State(state): State<TokensState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .sessions()
        .clear(auth.user.id)
        .await
        .db_err("Failed to clear session")?;

    let cookies = [
        (
            SET_COOKIE,
            clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
        ),
        (
            SET_COOKIE,
            clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
        ),
    ];

    Ok((
        AppendHeaders(cookies),
        ApiResponse::ok(serde_json::json!({}), "user logged out"),
    ))
}
