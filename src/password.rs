//! Password hashing and verification.
//!
//! Hashes are Argon2id PHC strings with a random salt.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use tracing::warn;

/// Opaque `verify(plain, hash)` capability used by the password grant.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

/// Argon2id verifier. A stored hash that cannot be parsed never matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, plain: &str, hash: &str) -> bool {
        use argon2::password_hash::PasswordVerifier as _;

        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Hash a password for storage.
pub fn hash_password(plain: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(plain.as_bytes(), &salt)?;
    Ok(hash.to_string())
}
