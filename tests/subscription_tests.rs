mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn test_subscribe_toggle() {
    let t = create_test_app().await;
    let (alice, _) = register_and_login(&t.app, "alice", "alice@example.com").await;
    register(&t.app, "bob", "bob@example.com").await;

    // First toggle subscribes
    let response = post_json_with_auth(&t.app, "/api/subscriptions/bob", &alice, "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["subscribed"], true);

    // Second toggle unsubscribes
    let response = post_json_with_auth(&t.app, "/api/subscriptions/bob", &alice, "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["subscribed"], false);
}

#[tokio::test]
async fn test_channel_stats() {
    let t = create_test_app().await;
    let (alice, _) = register_and_login(&t.app, "alice", "alice@example.com").await;
    let (carol, _) = register_and_login(&t.app, "carol", "carol@example.com").await;
    register(&t.app, "bob", "bob@example.com").await;

    post_json_with_auth(&t.app, "/api/subscriptions/bob", &alice, "").await;
    post_json_with_auth(&t.app, "/api/subscriptions/bob", &carol, "").await;
    post_json_with_auth(&t.app, "/api/subscriptions/carol", &alice, "").await;

    let response = get_with_auth(&t.app, "/api/subscriptions/bob", &alice).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["username"], "bob");
    assert_eq!(json["data"]["subscribers"], 2);
    assert_eq!(json["data"]["subscribedTo"], 0);

    let response = get_with_auth(&t.app, "/api/subscriptions/carol", &alice).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["subscribers"], 1);
    assert_eq!(json["data"]["subscribedTo"], 1);
}

#[tokio::test]
async fn test_subscribe_to_self() {
    let t = create_test_app().await;
    let (alice, _) = register_and_login(&t.app, "alice", "alice@example.com").await;

    let response = post_json_with_auth(&t.app, "/api/subscriptions/alice", &alice, "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscribe_unknown_channel() {
    let t = create_test_app().await;
    let (alice, _) = register_and_login(&t.app, "alice", "alice@example.com").await;

    let response = post_json_with_auth(&t.app, "/api/subscriptions/nobody", &alice, "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subscriptions_require_auth() {
    let t = create_test_app().await;
    register(&t.app, "bob", "bob@example.com").await;

    let response = post_json(&t.app, "/api/subscriptions/bob", "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
