pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod directory;
pub mod error;
pub mod grants;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod refresh;

use api::create_api_router;
use auth::PrincipalValidator;
use axum::Router;
use db::Database;
use grants::{GrantConfig, GrantService};
use jwt::TokenCodec;
use password::Argon2Verifier;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Base path all API routes are nested under.
pub const API_BASE: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Token lifetimes, store timeout and refresh rotation
    pub grant: GrantConfig,
    /// Per-IP limits for credential endpoints
    pub rate_limit: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(&config.jwt_secret));

    let users = Arc::new(config.db.users());
    let grants = Arc::new(GrantService::new(
        users.clone(),
        Arc::new(config.db.tokens()),
        Arc::new(Argon2Verifier),
        codec.clone(),
        config.grant,
    ));
    let validator = PrincipalValidator::new(users, config.grant.store_timeout);

    let api_router = create_api_router(
        config.db.clone(),
        codec,
        grants,
        validator,
        Arc::new(config.rate_limit.clone()),
    );

    Router::new().nest(API_BASE, api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
