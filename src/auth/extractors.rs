//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::bearer::get_bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::jwt::Principal;

/// Core authentication logic: bearer token, then signature and claims, then
/// the account gate. Any failure rejects the request.
async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Principal, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = get_bearer_token(&parts.headers).ok_or(AuthErrorKind::NotAuthenticated)?;

    let principal = state.codec().parse(token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AuthErrorKind::Rejected(e)
    })?;

    state
        .validator()
        .authenticate(principal)
        .await
        .map_err(AuthErrorKind::Rejected)
}

/// Extractor for API endpoints that require a valid access token from an
/// enabled account. Returns JSON errors.
pub struct BearerAuth(pub Principal);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(BearerAuth)
            .map_err(ApiAuthError)
    }
}
