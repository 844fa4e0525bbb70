mod common;

use axum::http::StatusCode;
use common::*;
use std::sync::Arc;

#[tokio::test]
async fn test_register_success() {
    let t = create_test_app().await;

    let response = post_multipart(
        &t.app,
        "/api/users/register",
        register_form("alice", "alice@example.com"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 201);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["email"], "alice@example.com");
    assert_eq!(json["data"]["fullName"], "Test User");
    assert!(
        json["data"]["avatarUrl"]
            .as_str()
            .unwrap()
            .starts_with("http://media.test/")
    );
    assert!(json["data"]["uuid"].as_str().is_some());

    // Secrets never appear in responses
    assert!(json["data"].get("passwordHash").is_none());
    assert!(json["data"].get("password_hash").is_none());
    assert!(json["data"].get("refreshToken").is_none());
}

#[tokio::test]
async fn test_register_missing_fields() {
    let t = create_test_app().await;

    let form = MultipartForm::new()
        .text("username", "alice")
        .text("email", "alice@example.com")
        .file("avatar", "a.png", b"png");
    let response = post_multipart(&t.app, "/api/users/register", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["statusCode"], 400);
    assert!(json["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_blank_fields_rejected() {
    let t = create_test_app().await;

    // Whitespace-only values do not count as present
    let form = MultipartForm::new()
        .text("username", "   ")
        .text("email", "alice@example.com")
        .text("password", "pw")
        .text("fullName", "Alice")
        .file("avatar", "a.png", b"png");
    let response = post_multipart(&t.app, "/api/users/register", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_missing_avatar() {
    let t = create_test_app().await;

    let form = MultipartForm::new()
        .text("username", "alice")
        .text("email", "alice@example.com")
        .text("password", "pw")
        .text("fullName", "Alice");
    let response = post_multipart(&t.app, "/api/users/register", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let t = create_test_app().await;
    register(&t.app, "alice", "alice@example.com").await;

    let response = post_multipart(
        &t.app,
        "/api/users/register",
        register_form("alice", "other@example.com"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(t.db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn test_register_duplicate_email_case_insensitive() {
    let t = create_test_app().await;
    register(&t.app, "alice", "alice@example.com").await;

    let response = post_multipart(
        &t.app,
        "/api/users/register",
        register_form("bob", "ALICE@EXAMPLE.COM"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_avatar_upload_failure() {
    let t = create_test_app_with_media(Arc::new(FailingMedia)).await;

    let response = post_multipart(
        &t.app,
        "/api/users/register",
        register_form("alice", "alice@example.com"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["message"], "avatar image upload failed");

    // Nothing was stored
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(t.db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_register_cover_upload_failure_tolerated() {
    let t = create_test_app_with_media(Arc::new(FirstUploadOnlyMedia::default())).await;

    let form = register_form("alice", "alice@example.com").file("coverImage", "c.png", b"png");
    let response = post_multipart(&t.app, "/api/users/register", form).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert!(
        json["data"]["avatarUrl"]
            .as_str()
            .unwrap()
            .starts_with("http://media.test/")
    );
    // Cover upload failed; registration proceeds with an empty URL
    assert_eq!(json["data"]["coverImageUrl"], "");
}

#[tokio::test]
async fn test_losing_registration_race_removes_uploads() {
    let media = Arc::new(RecordingMedia::default());
    let t = create_test_app_with_media(media.clone()).await;

    // Both requests pass the duplicate pre-check before either inserts (the
    // slow password hash sits between check and insert), so the unique index
    // decides the winner and the loser hits the create-failure path with an
    // already-uploaded avatar.
    let (a, b) = tokio::join!(
        post_multipart(
            &t.app,
            "/api/users/register",
            register_form("alice", "alice@example.com"),
        ),
        post_multipart(
            &t.app,
            "/api/users/register",
            register_form("alice", "alice@example.com"),
        ),
    );

    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(t.db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    // The loser's upload was removed; the winner's stored avatar was not
    let user = t.db.users().get_by_username("alice").await.unwrap().unwrap();
    let removed = media.removed.lock().unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!removed.contains(&user.avatar_url));
}

#[tokio::test]
async fn test_register_without_cover_image() {
    let t = create_test_app().await;

    let json = register(&t.app, "alice", "alice@example.com").await;
    assert_eq!(json["data"]["coverImageUrl"], "");
}

#[tokio::test]
async fn test_register_with_cover_image() {
    let t = create_test_app().await;

    let form = register_form("alice", "alice@example.com").file("coverImage", "c.png", b"png");
    let response = post_multipart(&t.app, "/api/users/register", form).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert!(
        json["data"]["coverImageUrl"]
            .as_str()
            .unwrap()
            .starts_with("http://media.test/")
    );
}

#[tokio::test]
async fn test_register_normalizes_username_and_email() {
    let t = create_test_app().await;

    let response = post_multipart(
        &t.app,
        "/api/users/register",
        register_form("Alice", "Alice@Example.COM"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["email"], "alice@example.com");
}
