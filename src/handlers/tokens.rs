use crate::app_state::AppState;
use crate::auth::{AuthUser, SCOPE_AUTHENTICATION};
use crate::error::ApiError;
use crate::validation::Validator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::shared_types::{JsonBody, MessageResponse};
use super::users::validate_password;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginInput {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

fn validate_login(input: &LoginInput) -> Result<(), ApiError> {
    // ---
    let mut v = Validator::new();
    v.check(!input.username.is_empty(), "username", "must be provided");
    validate_password(&mut v, &input.password);
    v.finish()
}

/// `POST /v1/tokens/authentication`: exchange username and password for a bearer token.
///
/// Unknown username and wrong password are indistinguishable to the caller: same body,
/// and an unknown username still runs one full password verification. No token
/// is issued unless the password verifies. With single-session enabled the user's
/// other authentication tokens are replaced in the same transaction.
#[tracing::instrument(skip_all)]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    validate_login(&input)?;

    let user = state
        .repository()
        .get_user_by_username(&input.username)
        .await?;

    let matches = state
        .verify_password(input.password, user.as_ref().map(|u| u.hashed_password.clone()))
        .await?;

    let user = match user {
        Some(user) if matches => user,
        Some(user) => {
            tracing::info!(user_id = user.id, "login rejected: wrong password");
            state.metrics().record_login(false);
            return Err(ApiError::InvalidCredentials);
        }
        None => {
            state.metrics().record_login(false);
            return Err(ApiError::InvalidCredentials);
        }
    };

    let tokens = state.tokens();
    let token = if state.single_session() {
        tokens
            .issue_exclusive(user.id, state.token_ttl(), SCOPE_AUTHENTICATION)
            .await?
    } else {
        tokens
            .issue(user.id, state.token_ttl(), SCOPE_AUTHENTICATION)
            .await?
    };

    state.metrics().record_login(true);
    tracing::info!(user_id = user.id, expiry = %token.expiry, "login succeeded");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

/// `DELETE /v1/tokens/authentication`: revoke every authentication token the caller holds.
pub async fn delete_authentication_tokens(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let removed = state
        .tokens()
        .revoke_all(user.id, SCOPE_AUTHENTICATION)
        .await?;

    tracing::info!(user_id = user.id, removed, "logged out");
    Ok(MessageResponse::new("you have been logged out"))
}
