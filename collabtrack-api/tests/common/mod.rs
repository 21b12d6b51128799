//! Common test utilities for integration tests
//!
//! - Test configuration and database setup
//! - Requests through the router without a socket
//! - Registered, verified users driven through the HTTP flow
//!
//! Database-backed tests need `DATABASE_URL`; without it [`TestContext::new`]
//! returns None and the test does nothing.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use collabtrack_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, DatabaseConfig, FederatedConfig, JwtConfig, MailConfig},
};
use collabtrack_shared::{db::migrations::run_migrations, mail::MemoryMailer};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "Corr3ct-horse!";

pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: Vec::new(),
            production: false,
            public_url: "https://app.example.com".to_string(),
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        mail: MailConfig {
            webhook_url: None,
            from: "no-reply@example.com".to_string(),
        },
        federated: FederatedConfig {
            userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
        },
    }
}

/// Registered user with a verified email and a fresh access token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestContext {
    pub db: PgPool,
    pub state: AppState,
    pub app: Router,
    pub mailer: MemoryMailer,
}

impl TestContext {
    /// Context on a migrated database, or None when `DATABASE_URL` is unset
    pub async fn new() -> Option<Self> {
        Self::with_config(|_| {}).await
    }

    /// Context on a migrated database with adjusted configuration
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Option<Self> {
        let url = database_url()?;

        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("connect to test database");

        run_migrations(&db).await.expect("run migrations");

        let mut config = test_config(&url);
        adjust(&mut config);
        Some(Self::with_pool(db, config))
    }

    /// Context whose pool never connects unless a handler touches it
    pub fn without_database() -> Self {
        let url = "postgres://collabtrack@127.0.0.1:1/unused";
        let db = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy(url)
            .expect("lazy pool");

        Self::with_pool(db, test_config(url))
    }

    fn with_pool(db: PgPool, config: Config) -> Self {
        let mailer = MemoryMailer::new();
        let state = AppState::new(db.clone(), config).with_mailer(Arc::new(mailer.clone()));
        let app = build_router(state.clone());

        Self {
            db,
            state,
            app,
            mailer,
        }
    }

    /// Sends a request and returns the status and JSON body (Null when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(build_request(method, uri, token, body))
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers an unverified account and returns the registration response
    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Test User",
                "email": email,
                "password": PASSWORD,
                "confirm_password": PASSWORD
            })),
        )
        .await
    }

    /// Token from the most recent mailed link to `email`
    pub fn mailed_token(&self, email: &str) -> String {
        let mail = self.mailer.last_to(email).expect("mail sent");
        mail.link
            .split("token=")
            .nth(1)
            .expect("link carries a token")
            .to_string()
    }

    /// Registers, verifies through the mailed link and signs in
    pub async fn verified_user(&self) -> TestUser {
        let email = unique_email();

        let (status, body) = self.register(&email).await;
        assert_eq!(status, StatusCode::CREATED, "register: {}", body);

        let token = self.mailed_token(&email);
        let (status, body) = self
            .request(
                Method::POST,
                "/v1/auth/verify-email",
                None,
                Some(json!({ "token": token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "verify: {}", body);

        let (status, body) = self
            .request(
                Method::POST,
                "/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email,
            token: body["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a project owned by `owner` and returns its id
    pub async fn create_project(&self, owner: &TestUser, name: &str) -> Uuid {
        let (status, body) = self
            .post("/v1/projects", &owner.token, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project: {}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Creates a task and returns its JSON
    pub async fn create_task(&self, user: &TestUser, project_id: Uuid, body: Value) -> Value {
        let (status, task) = self
            .post(&format!("/v1/projects/{}/tasks", project_id), &user.token, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task: {}", task);
        task
    }
}

pub fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Serves `userinfo` as the identity provider's userinfo document and
/// returns the endpoint URL
pub async fn serve_userinfo(userinfo: Value) -> String {
    let app = Router::new().route(
        "/userinfo",
        axum::routing::get(move || {
            let userinfo = userinfo.clone();
            async move { axum::Json(userinfo) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/userinfo", addr)
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4().simple())
}

/// Ids of the cards in one board column, in order
pub fn column_ids(board: &Value, column: &str) -> Vec<String> {
    board[column]
        .as_array()
        .unwrap_or_else(|| panic!("missing column {}", column))
        .iter()
        .map(|card| card["id"].as_str().unwrap().to_string())
        .collect()
}
