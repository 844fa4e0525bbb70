//! Single-active-session tracking backed by the `users.refresh_token` column.
//!
//! The column is the sole arbiter of "is this session still valid". Every
//! mutation of session state goes through this store; in particular
//! [`SessionStore::rotate`] performs the read-compare-write of the refresh
//! protocol as one conditional UPDATE, so two concurrent rotations against
//! the same stale value cannot both succeed.

use sqlx::sqlite::SqlitePool;

/// Session state for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No active session (stored token is NULL)
    NoSession,
    /// One active session identified by the stored refresh token value
    Active(String),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a refresh token for the account, replacing any prior value
    /// unconditionally (last-write-wins). Touches only the session column -
    /// no other account validation re-runs on this metadata write.
    pub async fn persist(&self, user_id: i64, refresh_token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(refresh_token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clear the stored session (logout).
    pub async fn clear(&self, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read the current session state for an account.
    pub async fn current(&self, user_id: i64) -> Result<SessionState, sqlx::Error> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT refresh_token FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row.and_then(|(token,)| token) {
            Some(token) => SessionState::Active(token),
            None => SessionState::NoSession,
        })
    }

    /// Replace the stored token only if it still equals `presented`.
    /// Returns false when the stored value has already moved on (the
    /// presented token was rotated out, or there is no session) - the
    /// caller treats that as replay of a stale token.
    pub async fn rotate(
        &self,
        user_id: i64,
        presented: &str,
        next: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
                .bind(next)
                .bind(user_id)
                .bind(presented)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all accounts with a stored session, for the cleanup sweep.
    pub async fn list_active(&self) -> Result<Vec<(i64, String)>, sqlx::Error> {
        sqlx::query_as("SELECT id, refresh_token FROM users WHERE refresh_token IS NOT NULL")
            .fetch_all(&self.pool)
            .await
    }
}
