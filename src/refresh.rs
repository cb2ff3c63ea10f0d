//! Opaque refresh token records.
//!
//! Refresh values carry no structure: they are random strings looked up in a
//! store that enforces their time-to-live. A value past its TTL behaves
//! exactly like one that was never issued.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{AuthError, AuthResult};

/// Bytes of randomness in a refresh value (256 bits).
pub const REFRESH_VALUE_BYTES: usize = 32;

/// A refresh token record bound to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub user_id: String,
    pub value: String,
}

impl RefreshTokenRecord {
    /// Build a fresh record with a new id and an unguessable value.
    pub fn issue(user_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            value: generate_refresh_value(),
        }
    }
}

/// Generate a random, URL-safe refresh value.
pub fn generate_refresh_value() -> String {
    let mut bytes = [0u8; REFRESH_VALUE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage for refresh token records.
///
/// Implementations must allow concurrent `save` and `get_by_value` without
/// caller-side locking and must never return an expired record.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Issue and persist a new record for `user_id`. Earlier records for the
    /// same user stay valid.
    async fn save(&self, user_id: &str, ttl: Duration) -> AuthResult<RefreshTokenRecord>;

    /// Look up a live record. Unknown, expired and revoked values all fail
    /// with [`AuthError::RefreshTokenNotFound`].
    async fn get_by_value(&self, value: &str) -> AuthResult<RefreshTokenRecord>;

    /// Revoke a value. Returns whether a live record was removed.
    async fn revoke(&self, value: &str) -> AuthResult<bool>;

    /// Drop records whose TTL has elapsed. Returns how many were removed.
    async fn purge_expired(&self) -> AuthResult<u64>;
}

/// In-process refresh store. Records vanish with the process.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<String, (RefreshTokenRecord, Instant)>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, live or not yet purged.
    pub fn len(&self) -> usize {
        // A poisoned map still has a meaningful size.
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> AuthResult<std::sync::MutexGuard<'_, HashMap<String, (RefreshTokenRecord, Instant)>>>
    {
        self.records
            .lock()
            .map_err(|_| AuthError::store("refresh store lock poisoned"))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn save(&self, user_id: &str, ttl: Duration) -> AuthResult<RefreshTokenRecord> {
        let record = RefreshTokenRecord::issue(user_id);
        let expires_at = Instant::now() + ttl;
        self.lock()?
            .insert(record.value.clone(), (record.clone(), expires_at));
        Ok(record)
    }

    async fn get_by_value(&self, value: &str) -> AuthResult<RefreshTokenRecord> {
        let mut records = self.lock()?;
        match records.get(value) {
            Some((record, expires_at)) if Instant::now() < *expires_at => Ok(record.clone()),
            Some(_) => {
                records.remove(value);
                Err(AuthError::RefreshTokenNotFound)
            }
            None => Err(AuthError::RefreshTokenNotFound),
        }
    }

    async fn revoke(&self, value: &str) -> AuthResult<bool> {
        let removed = self.lock()?.remove(value);
        Ok(removed.is_some_and(|(_, expires_at)| Instant::now() < expires_at))
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let now = Instant::now();
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, (_, expires_at)| now < *expires_at);
        Ok((before - records.len()) as u64)
    }
}
