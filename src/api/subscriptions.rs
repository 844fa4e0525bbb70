//! Subscription endpoints. Plain relation plumbing over accounts.
//!
//! - POST `/{username}` - toggle a subscription to that channel
//! - GET `/{username}` - subscriber counts for that channel

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::response::ApiResponse;
use crate::auth::{Auth, HasAuthBackend};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct SubscriptionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(SubscriptionsState);

pub fn router(state: SubscriptionsState) -> Router {
    Router::new()
        .route("/{username}", post(toggle_subscription))
        .route("/{username}", get(channel_stats))
        .with_state(state)
}

#[derive(Serialize)]
struct ToggleData {
    subscribed: bool,
}

async fn toggle_subscription(
    State(state): State<SubscriptionsState>,
    Auth(auth): Auth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = state
        .db
        .users()
        .get_by_username(&username)
        .await
        .db_err("Failed to look up channel")?
        .ok_or_else(|| ApiError::not_found("channel does not exist"))?;

    if channel.id == auth.user.id {
        return Err(ApiError::validation("cannot subscribe to yourself"));
    }

    let subs = state.db.subscriptions();
    let currently = subs
        .is_subscribed(auth.user.id, channel.id)
        .await
        .db_err("Failed to check subscription")?;

    if currently {
        subs.unsubscribe(auth.user.id, channel.id)
            .await
            .db_err("Failed to unsubscribe")?;
    } else {
        subs.subscribe(auth.user.id, channel.id)
            .await
            .db_err("Failed to subscribe")?;
    }

    Ok(ApiResponse::ok(
        ToggleData {
            subscribed: !currently,
        },
        "subscription updated",
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStats {
    username: String,
    subscribers: i64,
    subscribed_to: i64,
}

async fn channel_stats(
    State(state): State<SubscriptionsState>,
    Auth(_auth): Auth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = state
        .db
        .users()
        .get_by_username(&username)
        .await
        .db_err("Failed to look up channel")?
        .ok_or_else(|| ApiError::not_found("channel does not exist"))?;

    let subs = state.db.subscriptions();
    let subscribers = subs
        .subscriber_count(channel.id)
        .await
        .db_err("Failed to count subscribers")?;
    let subscribed_to = subs
        .subscribed_to_count(channel.id)
        .await
        .db_err("Failed to count subscriptions")?;

    Ok(ApiResponse::ok(
        ChannelStats {
            username: channel.username,
            subscribers,
            subscribed_to,
        },
        "channel stats fetched",
    ))
}
