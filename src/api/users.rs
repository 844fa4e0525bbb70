//! Account API endpoints.
//!
//! - POST `/register` - create an account (multipart: fields + avatar/cover)
//! - POST `/login` - verify credentials, issue token pair, open the session
//! - POST `/change-password` - replace the password after verifying the old one
//! - GET `/me` - current account, sanitized
//! - PATCH `/me` - update display name
//! - PATCH `/me/avatar`, PATCH `/me/cover` - upload and replace an image

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::error::{ApiError, ApiJson, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, HasAuthBackend, REFRESH_COOKIE_NAME, session_cookie,
};
use crate::db::{Database, NewUser, PublicUser, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::{MediaUploader, StagedUpload};
use crate::password;
use crate::api::response::ApiResponse;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub media: Arc<dyn MediaUploader>,
    pub staging_dir: PathBuf,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/change-password", post(change_password))
        .route("/me", get(current_user))
        .route("/me", patch(update_profile))
        .route("/me/avatar", patch(update_avatar))
        .route("/me/cover", patch(update_cover))
        // 12MB: two images plus field overhead
        .layer(DefaultBodyLimit::max(12 * 1024 * 1024))
        .with_state(state)
}

/// Hash a password off the async runtime (argon2 is deliberately slow).
async fn hash_blocking(plaintext: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash(&plaintext))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")
}

/// Verify a password off the async runtime.
async fn verify_blocking(plaintext: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || password::verify(&plaintext, &stored_hash))
        .await
        .internal_err("Password verification task failed")?
        .internal_err("Stored password hash is unreadable")
}

/// Re-read an account after a write and sanitize it for the response.
async fn reread_user(db: &Database, id: i64) -> Result<PublicUser, ApiError> {
    let user = db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to re-read account")?
        .ok_or_else(|| ApiError::internal("something went wrong while updating the account"))?;
    Ok(PublicUser::from(user))
}

// --- register ---

#[derive(Default)]
struct RegisterForm {
    username: String,
    email: String,
    password: String,
    full_name: String,
    avatar: Option<StagedUpload>,
    cover_image: Option<StagedUpload>,
}

/// Read the registration multipart body, staging file parts to disk.
/// Staged files are removed when the form drops, whatever the exit path.
async fn read_register_form(
    staging_dir: &std::path::Path,
    mut multipart: Multipart,
) -> Result<RegisterForm, ApiError> {
    let mut form = RegisterForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("invalid multipart data"))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "username" => form.username = read_text(field, "username").await?,
            "email" => form.email = read_text(field, "email").await?,
            "password" => form.password = read_text(field, "password").await?,
            "fullName" => form.full_name = read_text(field, "fullName").await?,
            "avatar" => form.avatar = Some(stage_file(staging_dir, field, "avatar").await?),
            "coverImage" => {
                form.cover_image = Some(stage_file(staging_dir, field, "coverImage").await?)
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::validation(format!("failed to read {} field", name)))
}

async fn stage_file(
    staging_dir: &std::path::Path,
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<StagedUpload, ApiError> {
    let file_name = field.file_name().unwrap_or("upload.bin").to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::validation(format!("failed to read {} file", name)))?;
    StagedUpload::write(staging_dir, &file_name, &bytes)
        .await
        .internal_err("Failed to stage uploaded file")
}

async fn register(
    State(state): State<UsersState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_register_form(&state.staging_dir, multipart).await?;

    let username = form.username.trim();
    let email = form.email.trim();
    let password = form.password.trim();
    let full_name = form.full_name.trim();

    if username.is_empty() || email.is_empty() || password.is_empty() || full_name.is_empty() {
        return Err(ApiError::validation(
            "username, email, password and fullName are all required",
        ));
    }

    // Duplicate check before any upload work. The unique indexes remain the
    // real arbiter; this just fails the common case early and releases the
    // staged files (dropped with the form) for cleanup.
    let taken = state
        .db
        .users()
        .exists_username_or_email(username, email)
        .await
        .db_err("Failed to check for existing account")?;
    if taken {
        return Err(ApiError::conflict(
            "user with this username or email already exists",
        ));
    }

    let Some(avatar) = form.avatar.as_ref() else {
        return Err(ApiError::validation("avatar image is required"));
    };

    let avatar_url = state
        .media
        .upload(avatar.path())
        .await
        .ok_or_else(|| ApiError::internal("avatar image upload failed"))?
        .url;

    // Cover image is optional and its upload failure is tolerated
    let cover_image_url = match form.cover_image.as_ref() {
        Some(staged) => state
            .media
            .upload(staged.path())
            .await
            .map(|m| m.url)
            .unwrap_or_default(),
        None => String::new(),
    };

    let password_hash = hash_blocking(password.to_string()).await?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let created = state
        .db
        .users()
        .create(NewUser {
            uuid: &uuid,
            username,
            email,
            full_name,
            password_hash: &password_hash,
            avatar_url: &avatar_url,
            cover_image_url: &cover_image_url,
        })
        .await;

    let id = match created {
        Ok(id) => id,
        Err(e) => {
            // The uploads already happened; a failed insert would orphan
            // them, so compensate best-effort before reporting the error.
            state.media.remove(&avatar_url).await;
            if !cover_image_url.is_empty() {
                state.media.remove(&cover_image_url).await;
            }

            // A concurrent registration can win the race between the
            // duplicate check and the insert; the unique index reports it
            // as a conflict.
            return Err(match e {
                sqlx::Error::Database(e) if e.is_unique_violation() => ApiError::conflict(
                    "user with this username or email already exists",
                ),
                e => ApiError::db_error("Failed to create account", e),
            });
        }
    };

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to re-read created account")?
        .ok_or_else(|| ApiError::internal("something went wrong while registering the user"))?;

    Ok(ApiResponse::created(
        PublicUser::from(user),
        "user registered successfully",
    ))
}

// --- login ---

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    user: PublicUser,
    access_token: String,
    refresh_token: String,
}

/// Issue a fresh access/refresh pair for an account and build the matching
/// Set-Cookie headers.
pub(super) fn issue_token_pair(
    jwt: &JwtConfig,
    user: &User,
    secure: bool,
) -> Result<(String, String, [(axum::http::header::HeaderName, String); 2]), ApiError> {
    let access = jwt
        .generate_access_token(user)
        .internal_err("Failed to generate access token")?;
    let refresh = jwt
        .generate_refresh_token(&user.uuid)
        .internal_err("Failed to generate refresh token")?;

    let cookies = [
        (
            SET_COOKIE,
            session_cookie(ACCESS_COOKIE_NAME, &access.token, access.duration, secure),
        ),
        (
            SET_COOKIE,
            session_cookie(REFRESH_COOKIE_NAME, &refresh.token, refresh.duration, secure),
        ),
    ];

    Ok((access.token, refresh.token, cookies))
}

async fn login(
    State(state): State<UsersState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = payload
        .username
        .as_deref()
        .or(payload.email.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("username or email is required"))?;

    let user = state
        .db
        .users()
        .get_by_username_or_email(identifier)
        .await
        .db_err("Failed to look up account")?
        // Distinct from the wrong-password message below; kept as-is, the
        // user-enumeration tradeoff is documented in DESIGN.md.
        .ok_or_else(|| ApiError::authentication("user does not exist"))?;

    let valid = verify_blocking(payload.password, user.password_hash.clone()).await?;
    if !valid {
        return Err(ApiError::authentication("invalid credentials"));
    }

    let (access_token, refresh_token, cookies) =
        issue_token_pair(&state.jwt, &user, state.secure_cookies)?;

    // A new login replaces any previous session outright
    state
        .db
        .sessions()
        .persist(user.id, &refresh_token)
        .await
        .db_err("Failed to persist session")?;

    Ok((
        AppendHeaders(cookies),
        ApiResponse::ok(
            SessionData {
                user: PublicUser::from(user),
                access_token,
                refresh_token,
            },
            "user logged in successfully",
        ),
    ))
}

// --- change password ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.new_password.trim().is_empty() {
        return Err(ApiError::validation("new password is required"));
    }

    let valid = verify_blocking(payload.old_password, auth.user.password_hash.clone()).await?;
    if !valid {
        return Err(ApiError::validation("invalid old password"));
    }

    let password_hash = hash_blocking(payload.new_password).await?;
    state
        .db
        .users()
        .update_password(auth.user.id, &password_hash)
        .await
        .db_err("Failed to update password")?;

    // The stored refresh token is left as-is: an existing session survives a
    // password change. Flagged as an open question in DESIGN.md.
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "password changed successfully",
    ))
}

// --- profile ---

async fn current_user(Auth(auth): Auth) -> impl IntoResponse {
    ApiResponse::ok(
        PublicUser::from(auth.user),
        "current user fetched successfully",
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    full_name: String,
}

async fn update_profile(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::validation("fullName is required"));
    }

    state
        .db
        .users()
        .update_full_name(auth.user.id, full_name)
        .await
        .db_err("Failed to update profile")?;

    let user = reread_user(&state.db, auth.user.id).await?;
    Ok(ApiResponse::ok(user, "profile updated successfully"))
}

/// Read a single named file field from a multipart body and stage it.
async fn read_single_file(
    staging_dir: &std::path::Path,
    mut multipart: Multipart,
    field_name: &str,
) -> Result<StagedUpload, ApiError> {
    let mut staged = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("invalid multipart data"))?
    {
        if field.name() == Some(field_name) {
            staged = Some(stage_file(staging_dir, field, field_name).await?);
        }
    }

    staged.ok_or_else(|| ApiError::validation(format!("{} file is required", field_name)))
}

async fn update_avatar(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let staged = read_single_file(&state.staging_dir, multipart, "avatar").await?;

    let uploaded = state
        .media
        .upload(staged.path())
        .await
        .ok_or_else(|| ApiError::internal("avatar image upload failed"))?;

    state
        .db
        .users()
        .set_avatar_url(auth.user.id, &uploaded.url)
        .await
        .db_err("Failed to update avatar")?;

    let user = reread_user(&state.db, auth.user.id).await?;
    Ok(ApiResponse::ok(user, "avatar updated successfully"))
}

async fn update_cover(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let staged = read_single_file(&state.staging_dir, multipart, "coverImage").await?;

    let uploaded = state
        .media
        .upload(staged.path())
        .await
        .ok_or_else(|| ApiError::internal("cover image upload failed"))?;

    state
        .db
        .users()
        .set_cover_image_url(auth.user.id, &uploaded.url)
        .await
        .db_err("Failed to update cover image")?;

    let user = reread_user(&state.db, auth.user.id).await?;
    Ok(ApiResponse::ok(user, "cover image updated successfully"))
}
