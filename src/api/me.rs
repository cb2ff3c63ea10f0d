//! Identity of the caller behind a bearer token.

use axum::{Json, Router, routing::get};
use std::sync::Arc;

use crate::auth::{BearerAuth, PrincipalValidator};
use crate::impl_has_auth_backend;
use crate::jwt::{Principal, TokenCodec};

#[derive(Clone)]
pub struct MeState {
    pub codec: Arc<TokenCodec>,
    pub validator: PrincipalValidator,
}

impl_has_auth_backend!(MeState);

pub fn router(state: MeState) -> Router {
    Router::new().route("/me", get(me)).with_state(state)
}

async fn me(BearerAuth(principal): BearerAuth) -> Json<Principal> {
    Json(principal)
}
