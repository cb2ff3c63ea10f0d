//! Access token generation and validation.
//!
//! Access tokens are compact HS512 JWTs carrying the username as `sub`, the
//! stable user id as `id` and the role names as `role`. They are stateless:
//! validity depends only on the signature and `exp`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Claim holding the role names.
pub const ROLE_CLAIM: &str = "role";

/// Claim holding the stable user id.
pub const ID_CLAIM: &str = "id";

/// The only algorithm this codec signs with or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS512;

/// JWT claims written into access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Role names
    pub role: Vec<String>,
    /// Stable user id
    pub id: String,
}

/// Claims as read back from a token. Every field is optional so a missing
/// claim is reported as invalid claims rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
struct ReadClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    role: Option<Vec<String>>,
    #[serde(default)]
    id: Option<String>,
}

/// Verified identity extracted from an access token.
///
/// Only [`TokenCodec::parse`] constructs one, so subject, id and roles are
/// always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    subject: String,
    id: String,
    roles: Vec<String>,
}

impl Principal {
    /// Username the token was issued to.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

/// Signs and verifies access tokens with a key derived from a shared secret.
///
/// Holds no mutable state; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec whose HMAC key is the raw bytes of `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry and claim presence are checked in `parse` so each failure
        // maps to its own error kind.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Generate an access token valid for `ttl` (whole seconds).
    pub fn generate(
        &self,
        subject: &str,
        id: &str,
        roles: &[String],
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = unix_now();
        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl.as_secs()),
            role: roles.to_vec(),
            id: id.to_string(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Verify a token and extract its principal.
    pub fn parse(&self, token: &str) -> AuthResult<Principal> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| classify_header(token))?;
        if header.alg != ALGORITHM {
            return Err(AuthError::TokenUnsupported);
        }

        let data = jsonwebtoken::decode::<ReadClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| map_decode_error(token, e.kind()))?;
        let claims = data.claims;

        let exp = claims.exp.ok_or(AuthError::TokenClaimsInvalid)?;
        if unix_now() >= exp {
            return Err(AuthError::TokenExpired);
        }

        let (Some(subject), Some(id), Some(roles)) = (claims.sub, claims.id, claims.role) else {
            return Err(AuthError::TokenClaimsInvalid);
        };
        if subject.trim().is_empty() || id.is_empty() || roles.is_empty() {
            return Err(AuthError::TokenClaimsInvalid);
        }

        Ok(Principal {
            subject,
            id,
            roles,
        })
    }

    /// Whether `token` parses. Use [`TokenCodec::parse`] when the reason matters.
    pub fn is_valid(&self, token: &str) -> bool {
        match self.parse(token) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Access token rejected");
                false
            }
        }
    }
}

fn map_decode_error(token: &str, kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature => AuthError::TokenSignatureInvalid,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthError::TokenUnsupported
        }
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::MissingRequiredClaim(_) => AuthError::TokenClaimsInvalid,
        _ if signature_segment_corrupt(token) => AuthError::TokenSignatureInvalid,
        _ => AuthError::TokenMalformed,
    }
}

/// Header and payload decode but the signature does not. The signature is
/// base64-decoded before it is compared, so a damaged signature surfaces as
/// a decoding error rather than a mismatch.
fn signature_segment_corrupt(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    URL_SAFE_NO_PAD.decode(header).is_ok()
        && URL_SAFE_NO_PAD.decode(payload).is_ok()
        && URL_SAFE_NO_PAD.decode(signature).is_err()
}

/// A header that fails to decode is malformed, unless it is valid JSON that
/// names an algorithm we do not know (e.g. `none`).
fn classify_header(token: &str) -> AuthError {
    let names_algorithm = token
        .split('.')
        .next()
        .and_then(|segment| URL_SAFE_NO_PAD.decode(segment).ok())
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .is_some_and(|header| header.get("alg").is_some_and(|alg| alg.is_string()));

    if names_algorithm {
        AuthError::TokenUnsupported
    } else {
        AuthError::TokenMalformed
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
