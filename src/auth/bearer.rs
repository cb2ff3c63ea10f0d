//! Bearer token parsing for authentication.

use axum::http::header;

/// Authorization scheme for access tokens.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the access token from an `Authorization: Bearer <token>` header.
pub fn get_bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_at_checked(BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
