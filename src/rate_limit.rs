//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default password grants per second per IP.
pub const DEFAULT_PASSWORD_GRANT_PER_SEC: u32 = 1;

/// Default password grant burst per IP.
pub const DEFAULT_PASSWORD_GRANT_BURST: u32 = 5;

/// Default user creations per minute per IP.
pub const DEFAULT_USER_CREATE_PER_MIN: u32 = 3;

/// Rate limiting configuration for credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for the password grant
    pub password_grant: Arc<IpLimiter>,
    /// Per-IP limiter for user creation
    pub user_create: Arc<IpLimiter>,
    /// Key limits by the first `X-Forwarded-For` entry instead of the peer address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    /// Create rate limiters. Zero values are raised to one.
    pub fn new(
        password_grant_per_sec: u32,
        password_grant_burst: u32,
        user_create_per_min: u32,
        trust_forwarded_for: bool,
    ) -> Self {
        let per_sec = NonZeroU32::new(password_grant_per_sec).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(password_grant_burst).unwrap_or(NonZeroU32::MIN);
        let per_min = NonZeroU32::new(user_create_per_min).unwrap_or(NonZeroU32::MIN);

        Self {
            password_grant: Arc::new(RateLimiter::keyed(
                Quota::per_second(per_sec).allow_burst(burst),
            )),
            user_create: Arc::new(RateLimiter::keyed(Quota::per_minute(per_min))),
            trust_forwarded_for,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_PASSWORD_GRANT_PER_SEC,
            DEFAULT_PASSWORD_GRANT_BURST,
            DEFAULT_USER_CREATE_PER_MIN,
            false,
        )
    }
}

async fn check(
    limiter: &IpLimiter,
    trust_forwarded_for: bool,
    request: Request,
    next: Next,
    message: &'static str,
) -> Response {
    let ip = match extract_client_ip(&request, trust_forwarded_for) {
        Ok(ip) => ip,
        Err(_) => {
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            (StatusCode::TOO_MANY_REQUESTS, message).into_response()
        }
    }
}

/// Middleware for rate limiting the password grant.
pub async fn rate_limit_password_grant(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.password_grant,
        config.trust_forwarded_for,
        request,
        next,
        "Too many authentication attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting user creation.
pub async fn rate_limit_user_create(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.user_create,
        config.trust_forwarded_for,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}
