//! Per-request identity resolution and the authorization gate.
//!
//! `authenticate` runs once per request and stores an [`Identity`] in the request
//! extensions. Handlers read it back through the [`Identity`] extractor (public
//! routes) or the [`AuthUser`] extractor, which rejects anonymous callers before the
//! handler body runs.

use super::tokens::{TokenService, SCOPE_AUTHENTICATION};
use super::AuthError;
use crate::app_state::AppState;
use crate::domain::{User, UserId};
use crate::error::ApiError;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, VARY};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Routes that never inspect the `Authorization` header.
const PUBLIC_ROUTES: &[(Method, &str)] = &[
    (Method::GET, "/v1/healthcheck"),
    (Method::POST, "/v1/users"),
    (Method::POST, "/v1/tokens/authentication"),
];

/// Who is making the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    // ---
    Anonymous,
    Authenticated(User),
}

impl Identity {
    // ---
    pub fn is_anonymous(&self) -> bool {
        // ---
        matches!(self, Self::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        // ---
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

/// Whether the identity stage skips resolution for this method and path.
pub fn is_public_route(method: &Method, path: &str) -> bool {
    // ---
    PUBLIC_ROUTES
        .iter()
        .any(|(public_method, public_path)| public_method == method && *public_path == path)
}

/// Turn request headers into an [`Identity`].
///
/// - no `Authorization` header: `Anonymous`
/// - header not exactly `Bearer <token>`: [`ApiError::InvalidCredentialsFormat`]
/// - unknown, expired or wrongly shaped token: [`ApiError::InvalidOrExpiredToken`]
/// - store failure: [`ApiError::Internal`], since the credential may well be valid
pub async fn resolve_identity(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, ApiError> {
    // ---
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::InvalidCredentialsFormat)?;

    let parts: Vec<&str> = header.split(' ').collect();
    let plaintext = match parts.as_slice() {
        ["Bearer", plaintext] => *plaintext,
        _ => return Err(ApiError::InvalidCredentialsFormat),
    };

    match tokens.resolve(SCOPE_AUTHENTICATION, plaintext).await {
        Ok(user) => Ok(Identity::Authenticated(user)),
        Err(AuthError::MalformedToken | AuthError::NotFound) => Err(ApiError::InvalidOrExpiredToken),
        Err(err) => Err(ApiError::Internal(err.into())),
    }
}

/// Identity stage of the request pipeline.
///
/// Every response leaving this stage carries `Vary: Authorization` so shared caches
/// never serve one caller's response to another.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // ---
    let identity = if is_public_route(request.method(), request.uri().path()) {
        Ok(Identity::Anonymous)
    } else {
        resolve_identity(state.tokens(), request.headers()).await
    };

    let mut response = match identity {
        Ok(identity) => {
            if let Identity::Authenticated(user) = &identity {
                tracing::debug!(user_id = user.id, "request authenticated");
            }
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            if err.status().is_client_error() {
                tracing::debug!(reason = err.reason(), "rejected credentials");
                state.metrics().record_auth_rejection(err.reason());
            }
            err.into_response()
        }
    };

    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));
    response
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Without the identity stage in front, nothing was proven: treat as anonymous.
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous))
    }
}

/// An authenticated caller. Extracting it is the authorization gate: anonymous
/// requests get [`ApiError::AuthenticationRequired`] before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Identity::from_request_parts(parts, state).await? {
            Identity::Authenticated(user) => Ok(AuthUser(user)),
            Identity::Anonymous => Err(ApiError::AuthenticationRequired),
        }
    }
}

/// Ownership check for mutations: only the creator may change or delete a resource.
pub fn ensure_owner(caller: &User, owner_id: UserId) -> Result<(), ApiError> {
    // ---
    if caller.id == owner_id {
        Ok(())
    } else {
        tracing::warn!(
            caller_id = caller.id,
            owner_id,
            "attempt to modify a resource owned by another user"
        );
        Err(ApiError::AuthorizationDenied)
    }
}
