//! Per-request re-validation of principals from verified access tokens.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::directory::UserDirectory;
use crate::error::{AuthError, AuthResult};
use crate::jwt::Principal;

/// Message carried by [`AuthError::AuthRejected`] for missing or disabled accounts.
pub const USER_DISABLED: &str = "user disabled";

/// Checks that the account behind a principal may still authenticate.
///
/// A token stays cryptographically valid until it expires; this gate is what
/// stops a disabled or deleted account from using one.
#[derive(Clone)]
pub struct PrincipalValidator {
    users: Arc<dyn UserDirectory>,
    store_timeout: Duration,
}

impl PrincipalValidator {
    pub fn new(users: Arc<dyn UserDirectory>, store_timeout: Duration) -> Self {
        Self {
            users,
            store_timeout,
        }
    }

    /// Return the principal unchanged if its account exists and is enabled.
    pub async fn authenticate(&self, principal: Principal) -> AuthResult<Principal> {
        let lookup = self.users.find_by_username(principal.subject());
        let user = match tokio::time::timeout(self.store_timeout, lookup).await {
            Ok(result) => result?,
            Err(_) => return Err(AuthError::StoreUnavailable("user lookup timed out".into())),
        };

        match user {
            Some(user) if user.enabled => Ok(principal),
            _ => {
                warn!(subject = %principal.subject(), "Rejected principal for missing or disabled account");
                Err(AuthError::AuthRejected(USER_DISABLED.into()))
            }
        }
    }
}
