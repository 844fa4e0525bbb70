use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// Account record as stored. `password_hash` and `refresh_token` never leave
/// the service boundary - convert to [`PublicUser`] before serializing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Sanitized account representation for responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            uuid: user.uuid,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            cover_image_url: user.cover_image_url,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Input for creating an account. Username and email are normalized to
/// lower-case here so storage and comparison always agree.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub cover_image_url: &'a str,
}

const USER_COLUMNS: &str = "id, uuid, username, email, full_name, password_hash, \
     avatar_url, cover_image_url, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account. Returns the row id.
    /// A unique-index violation on username or email surfaces as
    /// `sqlx::Error::Database` with `is_unique_violation() == true`; callers
    /// map it to a conflict.
    pub async fn create(&self, user: NewUser<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, full_name, password_hash, avatar_url, cover_image_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.uuid)
        .bind(user.username.to_lowercase())
        .bind(user.email.to_lowercase())
        .bind(user.full_name)
        .bind(user.password_hash)
        .bind(user.avatar_url)
        .bind(user.cover_image_url)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an account by row id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get an account by public uuid.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?"))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get an account by username, case-insensitively.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await
    }

    /// Get an account matching the identifier as either username or email,
    /// case-insensitively.
    pub async fn get_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let identifier = identifier.to_lowercase();
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? OR email = ?"
        ))
        .bind(&identifier)
        .bind(&identifier)
        .fetch_optional(&self.pool)
        .await
    }

    /// Check whether an account already exists with this username OR email.
    pub async fn exists_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username.to_lowercase())
                .bind(email.to_lowercase())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Replace the stored password hash. Only the password column changes.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the display name.
    pub async fn update_full_name(&self, id: i64, full_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET full_name = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(full_name)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the avatar URL.
    pub async fn set_avatar_url(&self, id: i64, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET avatar_url = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the cover image URL.
    pub async fn set_cover_image_url(&self, id: i64, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET cover_image_url = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
