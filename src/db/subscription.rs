//! Subscriber/channel relation between accounts. Plain data plumbing.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe an account to a channel. Idempotent.
    pub async fn subscribe(&self, subscriber_id: i64, channel_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (subscriber_id, channel_id) VALUES (?, ?)",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a subscription. Returns true if one existed.
    pub async fn unsubscribe(
        &self,
        subscriber_id: i64,
        channel_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
                .bind(subscriber_id)
                .bind(channel_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_subscribed(
        &self,
        subscriber_id: i64,
        channel_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Number of accounts subscribed to this channel.
    pub async fn subscriber_count(&self, channel_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Number of channels this account is subscribed to.
    pub async fn subscribed_to_count(&self, subscriber_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?")
                .bind(subscriber_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}
