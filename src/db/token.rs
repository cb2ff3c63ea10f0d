//! Refresh token storage.
//!
//! Only refresh tokens are stored in the database. Access tokens are
//! stateless and short-lived. Rows past `expires_at` are invisible to
//! lookups even before the cleanup task deletes them.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{AuthError, AuthResult};
use crate::refresh::{RefreshTokenRecord, RefreshTokenStore};

/// A stored refresh token with its expiry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveToken {
    pub id: String,
    pub user_id: String,
    pub value: String,
    /// Unix milliseconds
    pub expires_at: i64,
}

impl From<ActiveToken> for RefreshTokenRecord {
    fn from(token: ActiveToken) -> Self {
        Self {
            id: token.id,
            user_id: token.user_id,
            value: token.value,
        }
    }
}

/// SQLite-backed refresh token store.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record expiring `ttl` from now.
    pub async fn create(
        &self,
        record: &RefreshTokenRecord,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let expires_at = now_millis().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);

        sqlx::query("INSERT INTO refresh_tokens (id, user_id, value, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&record.id)
            .bind(&record.user_id)
            .bind(&record.value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get a live token by its value.
    pub async fn get_live(&self, value: &str) -> Result<Option<ActiveToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, value, expires_at FROM refresh_tokens WHERE value = ? AND expires_at > ?",
        )
        .bind(value)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a live token by its value (revoke).
    pub async fn delete_by_value(&self, value: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE value = ? AND expires_at > ?")
            .bind(value)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenStore for TokenStore {
    async fn save(&self, user_id: &str, ttl: Duration) -> AuthResult<RefreshTokenRecord> {
        let record = RefreshTokenRecord::issue(user_id);
        self.create(&record, ttl).await?;
        Ok(record)
    }

    async fn get_by_value(&self, value: &str) -> AuthResult<RefreshTokenRecord> {
        self.get_live(value)
            .await?
            .map(RefreshTokenRecord::from)
            .ok_or(AuthError::RefreshTokenNotFound)
    }

    async fn revoke(&self, value: &str) -> AuthResult<bool> {
        Ok(self.delete_by_value(value).await?)
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        Ok(self.delete_expired().await?)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
