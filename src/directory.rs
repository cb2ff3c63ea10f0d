//! User lookup capability consumed by the grant flows and the principal gate.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::AuthResult;

/// User role for authorization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Name written into the access token's role claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "USER" => Some(UserRole::User),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// A user as stored by the directory. The token core only reads it.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: BTreeSet<UserRole>,
    pub enabled: bool,
}

impl UserRecord {
    /// Role names in lexicographic order, as embedded in access tokens.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.iter().map(|r| r.as_str().to_string()).collect();
        names.sort();
        names
    }
}

/// Resolves users by username or id.
///
/// `Ok(None)` means the user does not exist; `Err` is reserved for store
/// failures so they are never mistaken for a missing user.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<UserRecord>>;
}
