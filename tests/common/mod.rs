#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;
use tubevault::{
    ServerConfig, create_app,
    db::Database,
    jwt::{JwtConfig, JwtSettings},
    media::{MediaUploader, UploadedMedia},
};

pub const TEST_ACCESS_SECRET: &[u8] = b"access-secret-for-testing-only!!";
pub const TEST_REFRESH_SECRET: &[u8] = b"refresh-secret-for-testing-only!";

/// Media stub that always succeeds, returning a unique fake URL.
pub struct StaticMedia;

impl MediaUploader for StaticMedia {
    fn upload<'a>(&'a self, _local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>> {
        Box::pin(async move {
            Some(UploadedMedia {
                url: format!("http://media.test/{}.png", uuid::Uuid::new_v4()),
            })
        })
    }

    fn remove<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }
}

/// Media stub that always fails.
pub struct FailingMedia;

impl MediaUploader for FailingMedia {
    fn upload<'a>(&'a self, _local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>> {
        Box::pin(async move { None })
    }

    fn remove<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }
}

/// Media stub where only the first upload succeeds. With the registration
/// handler uploading the avatar before the cover image, this exercises the
/// avatar-ok/cover-failed path.
#[derive(Default)]
pub struct FirstUploadOnlyMedia {
    calls: std::sync::atomic::AtomicUsize,
}

impl MediaUploader for FirstUploadOnlyMedia {
    fn upload<'a>(&'a self, _local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>> {
        Box::pin(async move {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            (call == 0).then(|| UploadedMedia {
                url: format!("http://media.test/{}.png", uuid::Uuid::new_v4()),
            })
        })
    }

    fn remove<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }
}

/// Media stub that succeeds on upload and records every removal.
#[derive(Default)]
pub struct RecordingMedia {
    pub removed: std::sync::Mutex<Vec<String>>,
}

impl MediaUploader for RecordingMedia {
    fn upload<'a>(&'a self, _local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>> {
        Box::pin(async move {
            Some(UploadedMedia {
                url: format!("http://media.test/{}.png", uuid::Uuid::new_v4()),
            })
        })
    }

    fn remove<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.removed.lock().unwrap().push(url.to_string());
        })
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_media(Arc::new(StaticMedia)).await
}

pub async fn create_test_app_with_media(media: Arc<dyn MediaUploader>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let jwt_settings = JwtSettings::new(TEST_ACCESS_SECRET.to_vec(), TEST_REFRESH_SECRET.to_vec());
    let jwt = JwtConfig::new(&jwt_settings);

    let config = ServerConfig {
        db: db.clone(),
        jwt: jwt_settings,
        secure_cookies: false, // Tests run without HTTPS
        media,
        staging_dir: std::env::temp_dir().join(format!("tubevault-test-{}", uuid::Uuid::new_v4())),
    };

    TestApp {
        app: create_app(&config),
        db,
        jwt,
    }
}

/// Hand-rolled multipart/form-data body builder.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("----tubevault-test-{}", uuid::Uuid::new_v4()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        let content_type = self.content_type();
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (content_type, self.body)
    }
}

/// A complete registration form for `username`, avatar included.
pub fn register_form(username: &str, email: &str) -> MultipartForm {
    MultipartForm::new()
        .text("username", username)
        .text("email", email)
        .text("password", "correct horse battery staple")
        .text("fullName", "Test User")
        .file("avatar", "avatar.png", b"fake-png-bytes")
}

pub async fn post_multipart(app: &Router, uri: &str, form: MultipartForm) -> Response<Body> {
    let (content_type, body) = form.finish();
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, json: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All Set-Cookie header values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn get_with_auth(app: &Router, uri: &str, access: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json_with_auth(
    app: &Router,
    uri: &str,
    access: &str,
    json: &str,
) -> Response<Body> {
    request_json_with_auth(app, "POST", uri, access, json).await
}

pub async fn patch_json_with_auth(
    app: &Router,
    uri: &str,
    access: &str,
    json: &str,
) -> Response<Body> {
    request_json_with_auth(app, "PATCH", uri, access, json).await
}

async fn request_json_with_auth(
    app: &Router,
    method: &str,
    uri: &str,
    access: &str,
    json: &str,
) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn patch_multipart_with_auth(
    app: &Router,
    uri: &str,
    access: &str,
    form: MultipartForm,
) -> Response<Body> {
    let (content_type, body) = form.finish();
    app.clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Register an account and assert it succeeded.
pub async fn register(app: &Router, username: &str, email: &str) -> serde_json::Value {
    let response = post_multipart(app, "/api/users/register", register_form(username, email)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Log in with the password used by `register_form`. Returns the access and
/// refresh tokens from the response body.
pub async fn login(app: &Router, username: &str) -> (String, String) {
    let payload = format!(
        r#"{{"username": "{}", "password": "correct horse battery staple"}}"#,
        username
    );
    let response = post_json(app, "/api/users/login", &payload).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let access = json["data"]["accessToken"].as_str().unwrap().to_string();
    let refresh = json["data"]["refreshToken"].as_str().unwrap().to_string();
    (access, refresh)
}

/// Register and log in, returning (access, refresh).
pub async fn register_and_login(app: &Router, username: &str, email: &str) -> (String, String) {
    register(app, username, email).await;
    login(app, username).await
}
