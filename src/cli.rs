//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, NewUser};
use crate::directory::UserRole;
use crate::grants::{
    DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, DEFAULT_STORE_TIMEOUT, GrantConfig, RefreshRotation,
};
use crate::password::hash_password;
use crate::rate_limit::{
    DEFAULT_PASSWORD_GRANT_BURST, DEFAULT_PASSWORD_GRANT_PER_SEC, DEFAULT_USER_CREATE_PER_MIN,
    RateLimitConfig,
};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Environment variable holding the password for `--create-admin`.
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenkeep",
    about = "Password and refresh grants with HS512 access tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 7291)]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tokens.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_TTL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_TTL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ttl_secs: u64,

    /// Upper bound on any single database call, in milliseconds
    #[arg(long, default_value_t = DEFAULT_STORE_TIMEOUT.as_millis() as u64, value_parser = clap::value_parser!(u64).range(1..))]
    pub store_timeout_ms: u64,

    /// Revoke a refresh token once it has been exchanged
    #[arg(long)]
    pub revoke_used_refresh: bool,

    /// Password grants allowed per second per client IP
    #[arg(long, default_value_t = DEFAULT_PASSWORD_GRANT_PER_SEC)]
    pub login_per_sec: u32,

    /// Password grant burst per client IP
    #[arg(long, default_value_t = DEFAULT_PASSWORD_GRANT_BURST)]
    pub login_burst: u32,

    /// Signups allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_USER_CREATE_PER_MIN)]
    pub signup_per_min: u32,

    /// Key rate limits by the first X-Forwarded-For entry (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Create an admin user with this username on startup. Password is read from ADMIN_PASSWORD
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Disable the account with this username and revoke its refresh tokens on startup
    #[arg(long, value_name = "USERNAME")]
    pub disable_user: Option<String>,

    /// Email for the admin created by --create-admin
    #[arg(long, default_value = "admin@localhost")]
    pub admin_email: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    check_secret_length(secret)
}

fn check_secret_length(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Handle the --create-admin flag: create an admin unless the name is taken.
/// Returns false and logs an error if the admin could not be created.
pub async fn handle_create_admin(db: &Database, username: &str, email: &str) -> bool {
    let password = match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => {
            // SAFETY: Same as JWT_SECRET, still single-threaded startup.
            unsafe { std::env::remove_var(ADMIN_PASSWORD_ENV) };
            password
        }
        _ => {
            error!("{} must be set to use --create-admin", ADMIN_PASSWORD_ENV);
            return false;
        }
    };

    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            info!(user_id = %existing.id, username = %existing.username, "Admin user already exists");
            return true;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            return false;
        }
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            return false;
        }
    };

    let user = NewUser::new(username, email, &password_hash)
        .with_roles([UserRole::User, UserRole::Admin]);
    match db.users().create(&user).await {
        Ok(created) => {
            info!(user_id = %created.id, username = %created.username, "Admin user created");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            false
        }
    }
}

/// Handle the --disable-user flag.
/// Returns false and logs an error if the account could not be disabled.
pub async fn handle_disable_user(db: &Database, username: &str) -> bool {
    let user = match db.users().get_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!(username = %username, "No such user to disable");
            return false;
        }
        Err(e) => {
            error!(error = %e, "Failed to look up user");
            return false;
        }
    };

    match db.users().disable(&user.id).await {
        Ok(Some(revoked)) => {
            info!(user_id = %user.id, revoked, "User disabled");
            true
        }
        Ok(None) => {
            error!(username = %username, "User vanished before it could be disabled");
            false
        }
        Err(e) => {
            error!(error = %e, "Failed to disable user");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    let rotation = if args.revoke_used_refresh {
        RefreshRotation::RevokeUsed
    } else {
        RefreshRotation::Keep
    };

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        grant: GrantConfig {
            access_ttl: Duration::from_secs(args.access_ttl_secs),
            refresh_ttl: Duration::from_secs(args.refresh_ttl_secs),
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            rotation,
        },
        rate_limit: RateLimitConfig::new(
            args.login_per_sec,
            args.login_burst,
            args.signup_per_min,
            args.trust_forwarded_for,
        ),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str, acquire_timeout: Duration) -> Option<Database> {
    match Database::open_with_timeout(path, acquire_timeout).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
