use axum::http::header::{VARY, WWW_AUTHENTICATE};
use axum::http::{Method, StatusCode};
use serde_json::json;
use starbloom::{AuthConfig, INTERNAL_ERROR_MESSAGE, TOKEN_PLAINTEXT_LEN};
use std::time::Duration;

mod common;

use common::{TestApp, PASSWORD};

// ============================================================================
// Identity stage
// ============================================================================

#[tokio::test]
async fn anonymous_caller_can_read_but_not_write() {
    // ---
    let app = TestApp::new();
    app.signup("frodo").await;

    let res = app.get("/v1/users/frodo", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["username"], "frodo");

    let res = app
        .post("/v1/posts", None, json!({ "content": "hello" }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body["error"],
        "you must be authenticated to access this resource"
    );
    assert_eq!(res.headers[WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn non_bearer_scheme_is_a_format_error() {
    // ---
    let app = TestApp::new();

    for header in ["Basic xyz", "Bearer", "Bearer  abc", "bearer abc", "Token a b"] {
        let res = app
            .call(Method::GET, "/v1/users/nobody", Some(header), None)
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "header {header:?}");
        assert_eq!(res.headers[WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            res.body["error"],
            "malformed authorization header, expected 'Bearer <token>'"
        );
    }
}

#[tokio::test]
async fn unknown_or_misshaped_tokens_are_rejected_before_the_handler() {
    // ---
    let app = TestApp::new();

    let short = "A".repeat(TOKEN_PLAINTEXT_LEN - 1);
    let unknown = "A".repeat(TOKEN_PLAINTEXT_LEN);

    for token in [short.as_str(), unknown.as_str()] {
        // Even a read-only route refuses a bad credential rather than going anonymous.
        let res = app.get("/v1/users/nobody", Some(token)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "invalid or missing authentication token");
        assert_eq!(res.headers[WWW_AUTHENTICATE], "Bearer");
    }
}

#[tokio::test]
async fn public_routes_ignore_the_authorization_header() {
    // ---
    let app = TestApp::new();

    let res = app
        .call(Method::GET, "/v1/healthcheck", Some("Basic xyz"), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "available");
    assert_eq!(res.body["system_info"]["environment"], "test");

    let res = app
        .call(
            Method::POST,
            "/v1/users",
            Some("Bearer not-a-token"),
            Some(json!({
                "username": "sam",
                "email": "sam@example.com",
                "first_name": "Samwise",
                "last_name": "Gamgee",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app
        .call(
            Method::POST,
            "/v1/tokens/authentication",
            Some("Basic xyz"),
            Some(json!({ "username": "sam", "password": PASSWORD })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
}

#[tokio::test]
async fn every_response_varies_on_authorization() {
    // ---
    let app = TestApp::new();
    let (_, token) = app.register("pippin").await;

    let responses = [
        app.get("/v1/healthcheck", None).await,
        app.get("/v1/users/pippin", Some(&token)).await,
        app.get("/v1/users/pippin", Some("garbage")).await,
        app.call(Method::GET, "/v1/feed", Some("Basic x"), None).await,
        app.get("/v1/feed", None).await,
    ];

    for res in responses {
        let vary: Vec<_> = res.headers.get_all(VARY).iter().collect();
        assert!(
            vary.iter().any(|v| *v == "Authorization"),
            "missing Vary on {} response",
            res.status
        );
    }
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn login_issues_a_token_that_authenticates() {
    // ---
    let app = TestApp::new();
    let id = app.signup("merry").await;

    let res = app.login_with("merry", PASSWORD).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let token = res.body["authentication_token"]["token"].as_str().unwrap();
    assert_eq!(token.len(), TOKEN_PLAINTEXT_LEN);
    assert!(res.body["authentication_token"]["expiry"].is_string());

    let res = app
        .post("/v1/posts", Some(token), json!({ "content": "second breakfast" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["post"]["user_id"], id);
}

#[tokio::test]
async fn failed_logins_issue_nothing() {
    // ---
    let app = TestApp::new();
    let id = app.signup("boromir").await;

    for _ in 0..2 {
        let res = app.login_with("boromir", "one-does-not-simply").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "invalid authentication credentials");
    }
    assert_eq!(app.repository.token_count(id), 0);

    // Unknown user gets the same answer as a wrong password.
    let res = app.login_with("faramir", PASSWORD).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "invalid authentication credentials");
}

#[tokio::test]
async fn login_input_is_validated() {
    // ---
    let app = TestApp::new();

    let res = app.login_with("", "short").await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"]["username"], "must be provided");
    assert_eq!(res.body["error"]["password"], "must be at least 8 bytes long");
}

#[tokio::test]
async fn second_login_revokes_the_first_session() {
    // ---
    let app = TestApp::new();
    let id = app.signup("aragorn").await;

    let first = app.login("aragorn").await;
    let second = app.login("aragorn").await;
    assert_ne!(first, second);
    assert_eq!(app.repository.token_count(id), 1);

    let res = app.get("/v1/feed", Some(&first)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/v1/feed", Some(&second)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn concurrent_sessions_when_single_session_is_off() {
    // ---
    let app = TestApp::with_auth(AuthConfig {
        single_session: false,
        ..common::cheap_auth()
    });
    let id = app.signup("legolas").await;

    let first = app.login("legolas").await;
    let second = app.login("legolas").await;
    assert_eq!(app.repository.token_count(id), 2);

    for token in [&first, &second] {
        let res = app.get("/v1/feed", Some(token)).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn expired_tokens_stop_authenticating() {
    // ---
    let app = TestApp::with_auth(AuthConfig {
        token_ttl: Duration::from_secs(1),
        ..common::cheap_auth()
    });
    let (_, token) = app.register("gimli").await;

    let res = app.get("/v1/feed", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let res = app.get("/v1/feed", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "invalid or missing authentication token");
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn logout_revokes_every_session() {
    // ---
    let app = TestApp::with_auth(AuthConfig {
        single_session: false,
        ..common::cheap_auth()
    });
    let id = app.signup("eowyn").await;
    let first = app.login("eowyn").await;
    let second = app.login("eowyn").await;

    let res = app.delete("/v1/tokens/authentication", Some(&first)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "you have been logged out");
    assert_eq!(app.repository.token_count(id), 0);

    for token in [&first, &second] {
        let res = app.get("/v1/feed", Some(token)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn logout_requires_a_session() {
    // ---
    let app = TestApp::new();

    let res = app.delete("/v1/tokens/authentication", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body["error"],
        "you must be authenticated to access this resource"
    );
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn store_outage_is_a_server_error_not_a_credential_error() {
    // ---
    let app = TestApp::new();
    let (_, token) = app.register("elrond").await;

    app.repository.set_available(false);

    let res = app.get("/v1/feed", Some(&token)).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], INTERNAL_ERROR_MESSAGE);
    assert!(res.headers.get(WWW_AUTHENTICATE).is_none());

    let res = app.login_with("elrond", PASSWORD).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    let res = app.get("/v1/healthcheck?mode=full", None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["status"], "error");

    app.repository.set_available(true);

    let res = app.get("/v1/feed", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
}
