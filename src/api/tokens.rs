//! Token grant endpoints.
//!
//! - POST `/password` - Exchange username and password for a token pair
//! - POST `/refresh` - Exchange a refresh token for a new token pair
//! - POST `/logout` - Revoke a refresh token

use axum::{
    Json, Router, extract::State, middleware, response::IntoResponse, routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::grants::GrantService;
use crate::rate_limit::{RateLimitConfig, rate_limit_password_grant};

#[derive(Clone)]
pub struct TokensState {
    pub grants: Arc<GrantService>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: TokensState) -> Router {
    let password_router = Router::new()
        .route("/password", post(password_grant))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_password_grant,
        ));

    Router::new()
        .route("/refresh", post(refresh_grant))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(password_router)
}

#[derive(Deserialize)]
struct PasswordGrantRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Serialize)]
struct LogoutResponse {
    revoked: bool,
}

async fn password_grant(
    State(state): State<TokensState>,
    Json(payload): Json<PasswordGrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let pair = state
        .grants
        .process_password_grant(payload.username.trim(), &payload.password)
        .await?;
    Ok(Json(pair))
}

async fn refresh_grant(
    State(state): State<TokensState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let pair = state
        .grants
        .process_refresh_grant(&payload.refresh_token)
        .await?;
    Ok(Json(pair))
}

/// Revoking an unknown or expired value is not an error; `revoked` reports
/// whether anything was removed.
async fn logout(
    State(state): State<TokensState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let revoked = state.grants.revoke(&payload.refresh_token).await?;
    Ok(Json(LogoutResponse { revoked }))
}
