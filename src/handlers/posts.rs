use crate::app_state::AppState;
use crate::auth::{ensure_owner, AuthUser};
use crate::domain::{Metadata, Post};
use crate::error::ApiError;
use crate::validation::{check_text, Validator};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::shared_types::{parse_id, JsonBody, MessageResponse, PageParams, DEFAULT_PAGE_SIZE};

/// Maximum post length, in characters.
const MAX_CONTENT_CHARS: usize = 255;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostInput {
    #[serde(default)]
    content: String,
}

fn validate_content(input: &PostInput) -> Result<(), ApiError> {
    // ---
    let mut v = Validator::new();
    check_text(&mut v, &input.content, "content", MAX_CONTENT_CHARS);
    v.finish()
}

/// Load a post or answer 404.
pub(crate) async fn find_post(state: &AppState, post_id: i64) -> Result<Post, ApiError> {
    // ---
    state
        .repository()
        .get_post(post_id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `POST /v1/posts`
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(input): JsonBody<PostInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    validate_content(&input)?;

    let post = state
        .repository()
        .insert_post(user.id, &input.content)
        .await?;

    tracing::info!(post_id = post.id, user_id = user.id, "post created");
    Ok((StatusCode::CREATED, Json(json!({ "post": post }))))
}

/// `GET /v1/posts/{id}`
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post = find_post(&state, parse_id(&id)?).await?;
    Ok(Json(json!({ "post": post })))
}

/// `PATCH /v1/posts/{id}`: owner-only, guarded by the `updated_at` version read here.
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<PostInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;
    validate_content(&input)?;

    let post = find_post(&state, post_id).await?;
    ensure_owner(&user, post.user_id)?;

    let post = state
        .repository()
        .update_post(post_id, &input.content, post.updated_at)
        .await?;

    Ok(Json(json!({ "post": post })))
}

/// `DELETE /v1/posts/{id}`: owner-only. Comments and likes go with it.
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;

    let post = find_post(&state, post_id).await?;
    ensure_owner(&user, post.user_id)?;

    state.repository().delete_post(post_id).await?;

    tracing::info!(post_id, user_id = user.id, "post deleted");
    Ok(MessageResponse::new("post successfully deleted"))
}

/// `GET /v1/users/{username}/posts`: newest first.
pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let filter = params.into_filter(DEFAULT_PAGE_SIZE)?;

    let author = state
        .repository()
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    let page = state
        .repository()
        .list_posts_by_user(author.id, &filter)
        .await?;

    Ok(Json(json!({
        "_metadata": Metadata::calculate(page.total_records, &filter),
        "posts": page.items,
    })))
}

/// `GET /v1/feed`: posts by everyone the caller follows, newest first.
pub async fn feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let filter = params.into_filter(DEFAULT_PAGE_SIZE)?;

    let page = state.repository().list_feed(user.id, &filter).await?;

    Ok(Json(json!({
        "_metadata": Metadata::calculate(page.total_records, &filter),
        "posts": page.items,
    })))
}
