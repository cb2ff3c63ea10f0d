use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokenkeep::cli::{
    Args, build_config, handle_create_admin, handle_disable_user, init_logging, load_jwt_secret,
    open_database,
};
use tokenkeep::{create_app, init_cleanup};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let store_timeout = Duration::from_millis(args.store_timeout_ms);
    let Some(db) = open_database(&args.database, store_timeout).await else {
        std::process::exit(1);
    };

    if let Some(username) = args.create_admin.as_deref() {
        if !handle_create_admin(&db, username, &args.admin_email).await {
            std::process::exit(1);
        }
    }

    if let Some(username) = args.disable_user.as_deref() {
        if !handle_disable_user(&db, username).await {
            std::process::exit(1);
        }
    }

    init_cleanup(&db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let config = build_config(&args, db, jwt_secret);
    let app = create_app(&config);

    info!(
        address = %local_addr,
        access_ttl_secs = config.grant.access_ttl.as_secs(),
        rotation = ?config.grant.rotation,
        "Listening"
    );

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
