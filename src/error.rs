//! API error types and response formatting.
//!
//! Every failure a handler or middleware can produce ends up here. Client errors carry
//! a descriptive message; server-side failures are logged (inside the request span, so
//! method, URL and host are attached) and answered with one opaque message.

use crate::auth::AuthError;
use crate::domain::StoreError;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;

/// Message returned for every 5xx response.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ---
    /// Unreadable request body or query.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// One or more fields failed validation.
    #[error("validation failed: {0:?}")]
    Validation(BTreeMap<String, String>),

    #[error("the requested resource could not be found")]
    NotFound,

    /// The path exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    /// Wrong username or password on login.
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// `Authorization` header present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    InvalidCredentialsFormat,

    /// Bearer token unknown, expired, or the wrong shape.
    #[error("invalid or expired authentication token")]
    InvalidOrExpiredToken,

    /// Anonymous caller on a route that needs an identity.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Authenticated caller does not own the resource.
    #[error("authorization denied")]
    AuthorizationDenied,

    /// Anything server-side: store failures, timeouts, hashing faults.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    // ---
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::InvalidCredentials
            | Self::InvalidCredentialsFormat
            | Self::InvalidOrExpiredToken
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthorizationDenied => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        // ---
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::EditConflict => "edit_conflict",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidCredentialsFormat => "invalid_credentials_format",
            Self::InvalidOrExpiredToken => "invalid_or_expired_token",
            Self::AuthenticationRequired => "authentication_required",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MalformedToken | AuthError::NotFound => Self::InvalidOrExpiredToken,
            other => Self::Internal(other.into()),
        }
    }
}

/// Opaque 500 used by the error path and the panic handler alike.
pub fn internal_error_response() -> Response {
    // ---
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                return internal_error_response();
            }
            Self::Validation(errors) => json!({ "error": errors }),
            Self::BadRequest(message) => json!({ "error": message }),
            Self::NotFound => json!({ "error": "the requested resource could not be found" }),
            Self::MethodNotAllowed => {
                json!({ "error": "the method is not supported for this resource" })
            }
            Self::EditConflict => json!({
                "error": "unable to update the record due to an edit conflict, please try again"
            }),
            Self::InvalidCredentials => json!({ "error": "invalid authentication credentials" }),
            Self::InvalidCredentialsFormat => json!({
                "error": "malformed authorization header, expected 'Bearer <token>'"
            }),
            Self::InvalidOrExpiredToken => {
                json!({ "error": "invalid or missing authentication token" })
            }
            Self::AuthenticationRequired => {
                json!({ "error": "you must be authenticated to access this resource" })
            }
            Self::AuthorizationDenied => {
                json!({ "error": "you do not have permission to modify this resource" })
            }
        };

        let mut response = (status, Json(body)).into_response();

        if matches!(
            self,
            Self::InvalidCredentialsFormat
                | Self::InvalidOrExpiredToken
                | Self::AuthenticationRequired
        ) {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
