//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::JwtSettings;
use crate::media::DiskMediaStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Tubevault", about = "User accounts with rotating refresh-token sessions")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7391")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tubevault.db")]
    pub database: String,

    /// Path to file containing the access-token signing secret.
    /// Prefer using the ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh-token signing secret.
    /// Prefer using the REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = crate::jwt::DEFAULT_ACCESS_TOKEN_DURATION_SECS)]
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = crate::jwt::DEFAULT_REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_token_ttl_secs: u64,

    /// Directory where uploaded media files are stored
    #[arg(long, default_value = "media")]
    pub media_root: PathBuf,

    /// Public base URL under which stored media is reachable
    #[arg(long, default_value = "http://localhost:7391/media/")]
    pub media_base_url: String,

    /// Set the Secure flag on session cookies (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from the named environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking.
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "Signing secret is required. Set the {} environment variable (recommended) or use a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the media base URL.
pub fn validate_media_base_url(media_base_url: &str) -> Option<Url> {
    match Url::parse(media_base_url) {
        Ok(url) => Some(url),
        Err(e) => {
            error!(url = %media_base_url, error = %e, "Invalid media base URL");
            None
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
    media_base_url: Url,
) -> Option<ServerConfig> {
    let media = match DiskMediaStore::new(&args.media_root, media_base_url) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(root = %args.media_root.display(), error = %e, "Failed to prepare media root");
            return None;
        }
    };

    let jwt = JwtSettings {
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_duration_secs: args.access_token_ttl_secs,
        refresh_duration_secs: args.refresh_token_ttl_secs,
    };

    Some(ServerConfig {
        db,
        jwt,
        secure_cookies: args.secure_cookies,
        media,
        staging_dir: std::env::temp_dir().join("tubevault-staging"),
    })
}
