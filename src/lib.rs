pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod media;
pub mod password;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::{JwtConfig, JwtSettings};
use media::MediaUploader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token signing secrets and lifetimes
    pub jwt: JwtSettings,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Media upload collaborator
    pub media: Arc<dyn MediaUploader>,
    /// Directory for staging incoming uploads before they are handed to the
    /// media collaborator
    pub staging_dir: PathBuf,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.secure_cookies,
        config.media.clone(),
        config.staging_dir.clone(),
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup on startup and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) {
    let jwt = JwtConfig::new(&config.jwt);
    cleanup::run_cleanup(&config.db, &jwt).await;
    cleanup::spawn_cleanup_scheduler(config.db.clone(), jwt);
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
