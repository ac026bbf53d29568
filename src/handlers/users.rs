use crate::app_state::AppState;
use crate::domain::{NewUser, StoreError};
use crate::error::ApiError;
use crate::validation::{check_text, Validator, EMAIL_RX};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::shared_types::{field_error, JsonBody};

/// Password bounds, in bytes. Argon2 accepts more, but the limit keeps hashing cost
/// bounded per request.
const PASSWORD_MIN_BYTES: usize = 8;
const PASSWORD_MAX_BYTES: usize = 72;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupInput {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    password: String,
}

pub(crate) fn validate_password(v: &mut Validator, password: &str) {
    // ---
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

fn validate_signup(input: &SignupInput) -> Result<(), ApiError> {
    // ---
    let mut v = Validator::new();

    check_text(&mut v, &input.username, "username", 50);
    v.check(!input.email.is_empty(), "email", "must be provided");
    v.check(
        EMAIL_RX.is_match(&input.email),
        "email",
        "must be a valid email address",
    );
    check_text(&mut v, &input.first_name, "first_name", 100);
    check_text(&mut v, &input.last_name, "last_name", 100);
    validate_password(&mut v, &input.password);

    v.finish()
}

/// `POST /v1/users`: register an account.
///
/// Input is validated before the password is hashed; a duplicate email or username
/// comes back from the store's unique constraints as a 422 field error.
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    validate_signup(&input)?;

    let hashed_password = state.hash_password(input.password).await?;

    let result = state
        .repository()
        .insert_user(NewUser {
            username: input.username,
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            hashed_password,
        })
        .await;

    let user = match result {
        Ok(user) => user,
        Err(err @ StoreError::DuplicateEmail) => {
            return Err(field_error("email", err));
        }
        Err(err @ StoreError::DuplicateUsername) => {
            return Err(field_error("username", err));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// `GET /v1/users/{username}`.
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let user = state
        .repository()
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(json!({ "user": user })))
}
