#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokenkeep::{
    ServerConfig, create_app,
    db::{Database, NewUser},
    directory::UserRole,
    grants::GrantConfig,
    password::hash_password,
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-with-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(GrantConfig::default(), RateLimitConfig::new(100, 100, 100, false)).await
    }

    pub async fn with_config(grant: GrantConfig, rate_limit: RateLimitConfig) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let config = ServerConfig {
            db: db.clone(),
            jwt_secret: TEST_SECRET.to_vec(),
            grant,
            rate_limit,
        };
        Self {
            app: create_app(&config),
            db,
        }
    }

    /// Insert an enabled user with [`TEST_PASSWORD`]. Returns the user id.
    pub async fn seed_user(&self, username: &str, roles: &[UserRole]) -> String {
        let hash = hash_password(TEST_PASSWORD).unwrap();
        let user = NewUser::new(username, &format!("{}@example.com", username), &hash)
            .with_roles(roles.iter().copied());
        self.db.users().create(&user).await.unwrap().id
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(json_request(uri, body)).await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> Response<Body> {
        let request = with_peer(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token)),
        )
        .body(Body::empty())
        .unwrap();
        self.send(request).await
    }

    /// Run the password grant and return `(access, refresh)`.
    pub async fn login(&self, username: &str) -> (String, String) {
        let response = self
            .post_json(
                "/api/v1/public/token/password",
                serde_json::json!({ "username": username, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), 200);
        let json = body_json(response).await;
        (
            json["token"].as_str().unwrap().to_string(),
            json["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

/// Attach a peer address the way `into_make_service_with_connect_info` would.
pub fn with_peer(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    with_peer(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json"),
    )
    .body(Body::from(body.to_string()))
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn wait_past(duration: Duration) {
    tokio::time::sleep(duration + Duration::from_millis(50)).await;
}
