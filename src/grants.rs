//! Password and refresh grants.
//!
//! Both flows end in the same issuance step: sign an access token for the
//! user, persist a new refresh record, and return the pair. The pair is only
//! returned after the refresh record has been written.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::USER_DISABLED;
use crate::directory::{UserDirectory, UserRecord};
use crate::error::{AuthError, AuthResult};
use crate::jwt::TokenCodec;
use crate::password::PasswordVerifier;
use crate::refresh::RefreshTokenStore;

/// Access token duration: 5 minutes
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(5 * 60);

/// Refresh token duration: 2 weeks
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Upper bound on any single store or directory call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// What happens to a refresh value once it has been exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshRotation {
    /// The consumed value stays valid until its TTL elapses.
    #[default]
    Keep,
    /// The consumed value is revoked once the new pair is committed.
    RevokeUsed,
}

/// Lifetimes and policies for issued credentials.
#[derive(Debug, Clone, Copy)]
pub struct GrantConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
    pub rotation: RefreshRotation,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            rotation: RefreshRotation::Keep,
        }
    }
}

/// Result of a successful grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Issues token pairs from passwords or refresh values.
#[derive(Clone)]
pub struct GrantService {
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    passwords: Arc<dyn PasswordVerifier>,
    codec: Arc<TokenCodec>,
    config: GrantConfig,
}

impl GrantService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        passwords: Arc<dyn PasswordVerifier>,
        codec: Arc<TokenCodec>,
        config: GrantConfig,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            passwords,
            codec,
            config,
        }
    }

    /// Exchange a username and password for a token pair.
    pub async fn process_password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<TokenPair> {
        let user = self
            .bounded(self.users.find_by_username(username))
            .await?
            .ok_or_else(|| {
                warn!(username = %username, "Password grant for unknown user");
                AuthError::UserNotFound
            })?;

        if !self.passwords.verify(password, &user.password_hash) {
            warn!(username = %username, "Password grant with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        ensure_enabled(&user)?;
        let pair = self.issue(&user).await?;
        info!(user_id = %user.id, "Password grant succeeded");
        Ok(pair)
    }

    /// Exchange a refresh value for a new token pair.
    pub async fn process_refresh_grant(&self, refresh_value: &str) -> AuthResult<TokenPair> {
        let record = self
            .bounded(self.refresh_tokens.get_by_value(refresh_value))
            .await?;

        let user = self
            .bounded(self.users.find_by_id(&record.user_id))
            .await?
            .ok_or_else(|| {
                warn!(user_id = %record.user_id, "Refresh grant for deleted user");
                AuthError::UserNotFound
            })?;

        ensure_enabled(&user)?;
        let pair = self.issue(&user).await?;

        if self.config.rotation == RefreshRotation::RevokeUsed {
            // The new pair is already committed; a failed revoke only leaves
            // the old value alive until its TTL.
            if let Err(e) = self.bounded(self.refresh_tokens.revoke(refresh_value)).await {
                warn!(error = %e, record_id = %record.id, "Failed to revoke used refresh token");
            }
        }

        info!(user_id = %user.id, "Refresh grant succeeded");
        Ok(pair)
    }

    /// Revoke a refresh value (logout).
    pub async fn revoke(&self, refresh_value: &str) -> AuthResult<bool> {
        self.bounded(self.refresh_tokens.revoke(refresh_value)).await
    }

    async fn issue(&self, user: &UserRecord) -> AuthResult<TokenPair> {
        // Sign first: a signing failure must not leave a refresh record behind.
        let access_token = self.codec.generate(
            &user.username,
            &user.id,
            &user.role_names(),
            self.config.access_ttl,
        )?;

        let record = self
            .bounded(self.refresh_tokens.save(&user.id, self.config.refresh_ttl))
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: record.value,
        })
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = AuthResult<T>>) -> AuthResult<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::StoreUnavailable("store call timed out".into())),
        }
    }
}

/// Disabled accounts get no new credentials.
fn ensure_enabled(user: &UserRecord) -> AuthResult<()> {
    if user.enabled {
        return Ok(());
    }
    warn!(user_id = %user.id, "Grant refused for disabled account");
    Err(AuthError::AuthRejected(USER_DISABLED.into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::directory::UserRole;
    use crate::refresh::{MemoryRefreshTokenStore, RefreshTokenRecord};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    const SECRET: &[u8] = b"test-secret-key-for-testing-0123456789";

    /// Directory backed by a map; passwords are stored as `plain:<pw>`.
    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub users: Mutex<HashMap<String, UserRecord>>,
    }

    impl FakeDirectory {
        pub fn with_user(id: &str, username: &str, password: &str, roles: &[UserRole]) -> Self {
            let dir = Self::default();
            dir.insert(id, username, password, roles);
            dir
        }

        pub fn insert(&self, id: &str, username: &str, password: &str, roles: &[UserRole]) {
            self.users.lock().unwrap().insert(
                id.to_string(),
                UserRecord {
                    id: id.to_string(),
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: format!("plain:{password}"),
                    roles: roles.iter().copied().collect::<BTreeSet<_>>(),
                    enabled: true,
                },
            );
        }

        pub fn set_enabled(&self, id: &str, enabled: bool) {
            if let Some(user) = self.users.lock().unwrap().get_mut(id) {
                user.enabled = enabled;
            }
        }

        pub fn remove(&self, id: &str) {
            self.users.lock().unwrap().remove(id);
        }
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn find_by_id(&self, id: &str) -> AuthResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap().get(id).cloned())
        }
    }

    pub(crate) struct PlainVerifier;

    impl PasswordVerifier for PlainVerifier {
        fn verify(&self, plain: &str, hash: &str) -> bool {
            hash.strip_prefix("plain:") == Some(plain)
        }
    }

    /// Refresh store whose calls never complete.
    struct HangingStore;

    #[async_trait]
    impl RefreshTokenStore for HangingStore {
        async fn save(&self, _user_id: &str, _ttl: Duration) -> AuthResult<RefreshTokenRecord> {
            std::future::pending().await
        }

        async fn get_by_value(&self, _value: &str) -> AuthResult<RefreshTokenRecord> {
            std::future::pending().await
        }

        async fn revoke(&self, _value: &str) -> AuthResult<bool> {
            std::future::pending().await
        }

        async fn purge_expired(&self) -> AuthResult<u64> {
            std::future::pending().await
        }
    }

    struct Fixture {
        service: GrantService,
        users: Arc<FakeDirectory>,
        store: Arc<MemoryRefreshTokenStore>,
        codec: Arc<TokenCodec>,
    }

    fn fixture(config: GrantConfig) -> Fixture {
        let users = Arc::new(FakeDirectory::with_user(
            "u1",
            "alice",
            "correct-pw",
            &[UserRole::User],
        ));
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let codec = Arc::new(TokenCodec::new(SECRET));
        let service = GrantService::new(
            users.clone(),
            store.clone(),
            Arc::new(PlainVerifier),
            codec.clone(),
            config,
        );
        Fixture {
            service,
            users,
            store,
            codec,
        }
    }

    #[tokio::test]
    async fn test_password_grant() {
        let f = fixture(GrantConfig::default());
        let pair = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();

        let principal = f.codec.parse(&pair.access_token).unwrap();
        assert_eq!(principal.subject(), "alice");
        assert_eq!(principal.id(), "u1");
        assert_eq!(principal.roles(), ["USER"]);

        let record = f.store.get_by_value(&pair.refresh_token).await.unwrap();
        assert_eq!(record.user_id, "u1");
    }

    #[tokio::test]
    async fn test_password_grant_wrong_password() {
        let f = fixture(GrantConfig::default());
        let result = f.service.process_password_grant("alice", "wrong-pw").await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_password_grant_unknown_user() {
        let f = fixture(GrantConfig::default());
        let result = f.service.process_password_grant("bob", "correct-pw").await;
        assert_eq!(result, Err(AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_role_names_sorted_in_token() {
        let f = fixture(GrantConfig::default());
        f.users
            .insert("u2", "root", "pw", &[UserRole::User, UserRole::Admin]);

        let pair = f.service.process_password_grant("root", "pw").await.unwrap();
        let principal = f.codec.parse(&pair.access_token).unwrap();
        assert_eq!(principal.roles(), ["ADMIN", "USER"]);
    }

    #[tokio::test]
    async fn test_refresh_grant() {
        let f = fixture(GrantConfig::default());
        let first = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();

        let second = f
            .service
            .process_refresh_grant(&first.refresh_token)
            .await
            .unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(
            f.codec.parse(&first.access_token).unwrap(),
            f.codec.parse(&second.access_token).unwrap()
        );

        // Without rotation the consumed value stays valid.
        assert!(f.store.get_by_value(&first.refresh_token).await.is_ok());
        assert!(f.store.get_by_value(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_grant_revokes_used_value() {
        let f = fixture(GrantConfig {
            rotation: RefreshRotation::RevokeUsed,
            ..GrantConfig::default()
        });
        let first = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();
        let second = f
            .service
            .process_refresh_grant(&first.refresh_token)
            .await
            .unwrap();

        assert_eq!(
            f.service.process_refresh_grant(&first.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        );
        assert!(f.service.process_refresh_grant(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_account_gets_no_pair() {
        let f = fixture(GrantConfig::default());
        let pair = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();
        f.users.set_enabled("u1", false);

        let rejected = Err(AuthError::AuthRejected(USER_DISABLED.into()));
        assert_eq!(
            f.service.process_password_grant("alice", "correct-pw").await,
            rejected
        );
        assert_eq!(
            f.service.process_refresh_grant(&pair.refresh_token).await,
            rejected
        );
        // Only the record from the first grant exists.
        assert_eq!(f.store.len(), 1);

        // A wrong password still reports bad credentials.
        assert_eq!(
            f.service.process_password_grant("alice", "wrong-pw").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn test_refresh_grant_unknown_value() {
        let f = fixture(GrantConfig::default());
        assert_eq!(
            f.service.process_refresh_grant("never-issued").await,
            Err(AuthError::RefreshTokenNotFound)
        );
    }

    #[tokio::test]
    async fn test_refresh_grant_deleted_user() {
        let f = fixture(GrantConfig::default());
        let pair = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();
        f.users.remove("u1");

        assert_eq!(
            f.service.process_refresh_grant(&pair.refresh_token).await,
            Err(AuthError::UserNotFound)
        );
    }

    #[tokio::test]
    async fn test_refresh_grant_expired_value() {
        let f = fixture(GrantConfig {
            refresh_ttl: Duration::from_millis(20),
            ..GrantConfig::default()
        });
        let pair = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(
            f.service.process_refresh_grant(&pair.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        );
    }

    #[tokio::test]
    async fn test_logout_revokes() {
        let f = fixture(GrantConfig::default());
        let pair = f
            .service
            .process_password_grant("alice", "correct-pw")
            .await
            .unwrap();

        assert!(f.service.revoke(&pair.refresh_token).await.unwrap());
        assert_eq!(
            f.service.process_refresh_grant(&pair.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        );
    }

    #[tokio::test]
    async fn test_store_timeout_is_unavailable() {
        let users = Arc::new(FakeDirectory::with_user(
            "u1",
            "alice",
            "correct-pw",
            &[UserRole::User],
        ));
        let service = GrantService::new(
            users,
            Arc::new(HangingStore),
            Arc::new(PlainVerifier),
            Arc::new(TokenCodec::new(SECRET)),
            GrantConfig {
                store_timeout: Duration::from_millis(20),
                ..GrantConfig::default()
            },
        );

        let result = service.process_password_grant("alice", "correct-pw").await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));

        let result = service.process_refresh_grant("anything").await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }
}
