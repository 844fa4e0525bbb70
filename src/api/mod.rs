mod error;
mod response;
mod subscriptions;
mod tokens;
mod users;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::media::MediaUploader;

pub use error::{ApiError, ErrorBody, ResultExt, error_body};
pub use response::ApiResponse;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    media: Arc<dyn MediaUploader>,
    staging_dir: PathBuf,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        media,
        staging_dir,
    };

    let tokens_state = tokens::TokensState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let subscriptions_state = subscriptions::SubscriptionsState {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/tokens", tokens::router(tokens_state))
        .nest("/subscriptions", subscriptions::router(subscriptions_state))
}
