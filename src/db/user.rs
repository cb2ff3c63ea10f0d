use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::collections::BTreeSet;

use crate::directory::{UserDirectory, UserRecord, UserRole};
use crate::error::AuthResult;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Fields needed to register a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: BTreeSet<UserRole>,
}

impl NewUser {
    /// A user with the default `USER` role.
    pub fn new(username: &str, email: &str, password_hash: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            roles: BTreeSet::from([UserRole::User]),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = UserRole>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    roles: String,
    enabled: i32,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles: decode_roles(&row.roles),
            enabled: row.enabled != 0,
        }
    }
}

/// Roles are stored as a comma-separated list; unknown names are dropped.
fn decode_roles(s: &str) -> BTreeSet<UserRole> {
    s.split(',').filter_map(UserRole::parse).collect()
}

fn encode_roles(roles: &BTreeSet<UserRole>) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an enabled user with a fresh UUID. Returns the stored record.
    pub async fn create(&self, user: &NewUser) -> Result<UserRecord, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, roles, enabled) VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(encode_roles(&user.roles))
        .execute(&self.pool)
        .await?;

        Ok(UserRecord {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            roles: user.roles.clone(),
            enabled: true,
        })
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, roles, enabled FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, roles, enabled FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    /// Disable an account and revoke its refresh tokens in one transaction.
    /// Returns the number of revoked tokens, or `None` if no such user.
    /// Access tokens already issued are refused by the principal gate.
    pub async fn disable(&self, id: &str) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET enabled = 0 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let revoked = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(revoked.rows_affected()))
    }

    /// Check if a username is available.
    pub async fn is_username_available(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    /// Delete a user by ID. Their refresh tokens go with them.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserDirectory for UserStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.get_by_username(username).await?)
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.get_by_id(id).await?)
    }
}
