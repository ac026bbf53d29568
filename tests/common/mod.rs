// Test helpers are intentionally partially used
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use reqwest::Client;
use serde_json::{json, Value};
use starbloom::domain::MetricsPtr;
use starbloom::{
    build_router, create_memory_repository, create_noop_metrics, AppState, AuthConfig, CorsConfig,
    HashCost, MemoryRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower::ServiceExt;

macro_rules! set_env_if_unset {
    // ---
    ($key:expr, $val:expr) => {
        if std::env::var($key).is_err() {
            std::env::set_var($key, $val);
        }
    };
}

/// Password every helper-created account uses.
pub const PASSWORD: &str = "pa55word-long-enough";

// ============================================================================
// Test Setup
// ============================================================================

/// Argon2 parameters small enough to keep the suite fast.
pub fn cheap_auth() -> AuthConfig {
    // ---
    AuthConfig {
        hash_cost: HashCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        ..AuthConfig::default()
    }
}

/// A decoded response: status, headers and a JSON body (`Null` when empty).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// In-process application backed by the memory store; requests go through
/// `tower::ServiceExt::oneshot`, no socket involved.
pub struct TestApp {
    pub router: Router,
    pub repository: Arc<MemoryRepository>,
}

impl TestApp {
    // ---
    pub fn new() -> Self {
        // ---
        Self::build(create_noop_metrics().unwrap(), cheap_auth())
    }

    pub fn with_auth(auth: AuthConfig) -> Self {
        // ---
        Self::build(create_noop_metrics().unwrap(), auth)
    }

    pub fn with_metrics(metrics: MetricsPtr) -> Self {
        // ---
        Self::build(metrics, cheap_auth())
    }

    fn build(metrics: MetricsPtr, auth: AuthConfig) -> Self {
        // ---
        let repository = create_memory_repository();
        let state = AppState::new(metrics, repository.clone(), &auth, "test").unwrap();
        let router = build_router(state, &CorsConfig::default());

        Self { router, repository }
    }

    /// Send a fully built request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        // ---
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Request with a raw `Authorization` header value.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        // ---
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        // ---
        let bearer = token.map(|t| format!("Bearer {t}"));
        self.call(Method::GET, path, bearer.as_deref(), None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        // ---
        let bearer = token.map(|t| format!("Bearer {t}"));
        self.call(Method::POST, path, bearer.as_deref(), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        // ---
        let bearer = token.map(|t| format!("Bearer {t}"));
        self.call(Method::PATCH, path, bearer.as_deref(), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        // ---
        let bearer = token.map(|t| format!("Bearer {t}"));
        self.call(Method::DELETE, path, bearer.as_deref(), None).await
    }

    /// Register `username` with [`PASSWORD`], returning the new user id.
    pub async fn signup(&self, username: &str) -> i64 {
        // ---
        let res = self
            .post(
                "/v1/users",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "first_name": "Test",
                    "last_name": username,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {:?}", res.body);
        res.body["user"]["id"].as_i64().unwrap()
    }

    /// Log `username` in with `password`, returning the raw response.
    pub async fn login_with(&self, username: &str, password: &str) -> TestResponse {
        // ---
        self.post(
            "/v1/tokens/authentication",
            None,
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Log in with [`PASSWORD`], returning the plaintext bearer token.
    pub async fn login(&self, username: &str) -> String {
        // ---
        let res = self.login_with(username, PASSWORD).await;
        assert_eq!(res.status, StatusCode::CREATED, "login failed: {:?}", res.body);
        res.body["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Sign up and log in, returning `(user_id, token)`.
    pub async fn register(&self, username: &str) -> (i64, String) {
        // ---
        let id = self.signup(username).await;
        let token = self.login(username).await;
        (id, token)
    }
}

// ============================================================================
// Live server
// ============================================================================

/// Serves a [`TestApp`] router on an ephemeral local port.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub client: Client,
}

impl TestServer {
    // ---
    pub async fn new(app: &TestApp) -> Self {
        // ---
        // Enable debug logging only when requested
        if std::env::var("TEST_DEBUG").is_ok() {
            set_env_if_unset!("RUST_LOG", "debug");
            starbloom::init_tracing();
        }

        let router = app.router.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // Give the server a moment to start
        sleep(Duration::from_millis(100)).await;

        let client = Client::new();

        Self { addr, client }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }
}
