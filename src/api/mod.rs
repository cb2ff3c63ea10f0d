mod error;
mod me;
mod tokens;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::PrincipalValidator;
use crate::db::Database;
use crate::grants::GrantService;
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    codec: Arc<TokenCodec>,
    grants: Arc<GrantService>,
    validator: PrincipalValidator,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let me_state = me::MeState {
        codec,
        validator,
    };

    let tokens_state = tokens::TokensState {
        grants,
        rate_limit_config: rate_limit_config.clone(),
    };

    let users_state = users::UsersState {
        db,
        rate_limit_config,
    };

    Router::new()
        .nest("/public/token", tokens::router(tokens_state))
        .nest("/public/user", users::router(users_state))
        .nest("/user", me::router(me_state))
}
