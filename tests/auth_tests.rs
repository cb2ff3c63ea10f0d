mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TEST_SECRET, TestApp, body_json, with_peer};
use std::time::Duration;
use tokenkeep::{
    directory::UserRole, grants::GrantConfig, jwt::TokenCodec, rate_limit::RateLimitConfig,
};

const ME_URI: &str = "/api/v1/user/me";

#[tokio::test]
async fn test_me_without_token() {
    let app = TestApp::new().await;

    let request = with_peer(Request::builder().uri(ME_URI))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(body_json(response).await["error"], "Not authenticated");
}

#[tokio::test]
async fn test_me_with_non_bearer_scheme() {
    let app = TestApp::new().await;
    app.seed_user("alice", &[UserRole::User]).await;
    let (access, _) = app.login("alice").await;

    let request = with_peer(
        Request::builder()
            .uri(ME_URI)
            .header(header::AUTHORIZATION, format!("Basic {}", access)),
    )
    .body(Body::empty())
    .unwrap();

    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_garbage_token() {
    let app = TestApp::new().await;

    let response = app.get_with_bearer(ME_URI, "not.a.token").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn test_me_with_tampered_token() {
    let app = TestApp::new().await;
    app.seed_user("alice", &[UserRole::User]).await;
    let (access, _) = app.login("alice").await;

    let (head, sig) = access.rsplit_once('.').unwrap();
    let first = if sig.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{}.{}{}", head, first, &sig[1..]);

    let response = app.get_with_bearer(ME_URI, &tampered).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid token signature");
}

#[tokio::test]
async fn test_me_with_foreign_secret() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("alice", &[UserRole::User]).await;

    let forged = TokenCodec::new(b"some-other-secret-that-is-32-bytes-long")
        .generate("alice", &user_id, &["ADMIN".to_string()], Duration::from_secs(60))
        .unwrap();

    let response = app.get_with_bearer(ME_URI, &forged).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_expired_token() {
    let grant = GrantConfig {
        access_ttl: Duration::ZERO,
        ..GrantConfig::default()
    };
    let app = TestApp::with_config(grant, RateLimitConfig::new(100, 100, 100, false)).await;
    app.seed_user("alice", &[UserRole::User]).await;
    let (access, _) = app.login("alice").await;

    let response = app.get_with_bearer(ME_URI, &access).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Token expired");
}

#[tokio::test]
async fn test_disabled_account_is_rejected() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("alice", &[UserRole::User]).await;
    let (access, _) = app.login("alice").await;

    app.db.users().disable(&user_id).await.unwrap();

    let response = app.get_with_bearer(ME_URI, &access).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Account disabled");
}

#[tokio::test]
async fn test_deleted_account_is_rejected() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("alice", &[UserRole::User]).await;
    let (access, _) = app.login("alice").await;

    app.db.users().delete(&user_id).await.unwrap();

    let response = app.get_with_bearer(ME_URI, &access).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unavailable_store_is_503() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("alice", &[UserRole::User]).await;
    let access = TokenCodec::new(TEST_SECRET)
        .generate("alice", &user_id, &["USER".to_string()], Duration::from_secs(60))
        .unwrap();

    app.db.pool().close().await;

    let response = app.get_with_bearer(ME_URI, &access).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
