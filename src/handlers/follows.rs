use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Metadata, StoreError, User};
use crate::error::ApiError;
use crate::validation::Validator;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::shared_types::{
    parse_id, JsonBody, MessageResponse, PageParams, DEFAULT_FOLLOW_PAGE_SIZE,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowInput {
    #[serde(default)]
    user_id: i64,
}

async fn find_user(state: &AppState, username: &str) -> Result<User, ApiError> {
    // ---
    state
        .repository()
        .get_user_by_username(username)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `POST /v1/follows`: the caller follows `user_id`.
pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(input): JsonBody<FollowInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let mut v = Validator::new();
    v.check(input.user_id > 0, "user_id", "must be provided");
    v.check(input.user_id != user.id, "user_id", "must not be your own user_id");
    v.finish()?;

    let follow = match state.repository().insert_follow(input.user_id, user.id).await {
        Ok(follow) => follow,
        Err(err @ StoreError::AlreadyFollowing) => {
            return Err(ApiError::BadRequest(err.to_string()))
        }
        Err(StoreError::InvalidUserId) => return Err(ApiError::NotFound),
        Err(err) => return Err(err.into()),
    };

    Ok((StatusCode::CREATED, Json(json!({ "follow": follow }))))
}

/// `DELETE /v1/follows/{user_id}`
pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let followed_id = parse_id(&user_id)?;

    state.repository().delete_follow(followed_id, user.id).await?;
    Ok(MessageResponse::new("successfully unfollowed"))
}

/// `GET /v1/users/{username}/followers`
pub async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let filter = params.into_filter(DEFAULT_FOLLOW_PAGE_SIZE)?;
    let target = find_user(&state, &username).await?;

    let page = state.repository().list_followers(target.id, &filter).await?;

    Ok(Json(json!({
        "_metadata": Metadata::calculate(page.total_records, &filter),
        "users": page.items,
    })))
}

/// `GET /v1/users/{username}/following`
pub async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let filter = params.into_filter(DEFAULT_FOLLOW_PAGE_SIZE)?;
    let target = find_user(&state, &username).await?;

    let page = state.repository().list_following(target.id, &filter).await?;

    Ok(Json(json!({
        "_metadata": Metadata::calculate(page.total_records, &filter),
        "users": page.items,
    })))
}
