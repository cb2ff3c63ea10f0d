//! Error taxonomy shared by the codec, the stores and the grant flows.

/// Every way issuing or verifying a credential can fail.
///
/// All variants are terminal for the current request. Callers map them to
/// client-visible responses, so kinds are never merged except by
/// [`TokenCodec::is_valid`](crate::jwt::TokenCodec::is_valid).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The credential is not a decodable compact token.
    #[error("malformed token")]
    TokenMalformed,
    /// The signature does not match the configured secret.
    #[error("invalid token signature")]
    TokenSignatureInvalid,
    /// The credential's expiration time has passed.
    #[error("token expired")]
    TokenExpired,
    /// The credential declares a signing algorithm other than HS512.
    #[error("unsupported token algorithm")]
    TokenUnsupported,
    /// Subject, id or role claim is absent or empty.
    #[error("token claims invalid")]
    TokenClaimsInvalid,
    /// The credential could not be signed.
    #[error("failed to sign token: {0}")]
    TokenSigning(String),
    /// Refresh value never issued, expired, or revoked.
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("user not found")]
    UserNotFound,
    /// Password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Principal verified but the account may no longer authenticate.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    /// Backing store failed or timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuthError {
    pub fn store(e: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        Self::store(e)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
