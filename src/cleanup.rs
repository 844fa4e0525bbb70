//! Scheduled cleanup of expired stored sessions.
//!
//! A stored refresh token whose expiry has passed can never pass the
//! exact-match check again, but clearing it keeps the session column an
//! honest reflection of "no active session".

use crate::db::Database;
use crate::jwt::{JwtConfig, JwtError};
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run the cleanup once: clear every stored session token that no longer
/// validates as an unexpired refresh token.
pub async fn run_cleanup(db: &Database, jwt: &JwtConfig) {
    let active = match db.sessions().list_active().await {
        Ok(active) => active,
        Err(e) => {
            error!("Failed to list active sessions: {}", e);
            return;
        }
    };

    let mut cleared = 0u64;
    for (user_id, token) in active {
        match jwt.validate_refresh_token(&token) {
            Ok(_) => {}
            Err(JwtError::Expired) | Err(JwtError::InvalidSignature) | Err(JwtError::Malformed) => {
                match db.sessions().clear(user_id).await {
                    Ok(()) => cleared += 1,
                    Err(e) => error!("Failed to clear expired session: {}", e),
                }
            }
            Err(_) => {}
        }
    }

    if cleared > 0 {
        info!("Cleared {} expired sessions", cleared);
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database, jwt: JwtConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db, &jwt).await;
        }
    })
}
