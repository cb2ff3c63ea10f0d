//! Public user registration.

use axum::{
    Json, Router, extract::State, http::StatusCode, middleware, response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::db::{Database, NewUser};
use crate::directory::UserRole;
use crate::password::hash_password;
use crate::rate_limit::{RateLimitConfig, rate_limit_user_create};

const MAX_USERNAME_LENGTH: usize = 32;
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", post(create_user))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config,
            rate_limit_user_create,
        ))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    roles: Option<Vec<String>>,
}

#[derive(Serialize)]
struct CreateUserResponse {
    id: String,
    username: String,
    email: String,
    roles: Vec<String>,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Username cannot be longer than {} characters",
            MAX_USERNAME_LENGTH
        )));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    Ok(())
}

/// Self-registration only ever yields `USER`. Asking for anything more is refused.
fn check_requested_roles(roles: Option<&[String]>) -> Result<(), ApiError> {
    for name in roles.unwrap_or_default() {
        match UserRole::parse(name) {
            Some(UserRole::User) => {}
            Some(UserRole::Admin) => {
                return Err(ApiError::forbidden("Cannot self-assign the ADMIN role"));
            }
            None => return Err(ApiError::bad_request(format!("Unknown role: {}", name))),
        }
    }
    Ok(())
}

async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    validate_username(username)?;

    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    check_requested_roles(payload.roles.as_deref())?;

    let available = state
        .db
        .users()
        .is_username_available(username)
        .await
        .db_err("Failed to check username availability")?;

    if !available {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create user")
    })?;

    let user = match state
        .db
        .users()
        .create(&NewUser::new(username, email, &password_hash))
        .await
    {
        Ok(user) => user,
        // Lost a race with a concurrent signup for the same name.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::conflict("Username is already taken"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            roles: user.role_names(),
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}
