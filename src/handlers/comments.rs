use crate::app_state::AppState;
use crate::auth::{ensure_owner, AuthUser};
use crate::domain::{CommentWithAuthor, Metadata, StoreError};
use crate::error::ApiError;
use crate::validation::{check_text, Validator};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::posts::find_post;
use super::shared_types::{parse_id, JsonBody, MessageResponse, PageParams, DEFAULT_PAGE_SIZE};

/// Maximum comment length, in characters.
const MAX_COMMENT_CHARS: usize = 255;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCommentInput {
    #[serde(default)]
    post_id: i64,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditCommentInput {
    #[serde(default)]
    comment: String,
}

async fn find_comment(state: &AppState, comment_id: i64) -> Result<CommentWithAuthor, ApiError> {
    // ---
    state
        .repository()
        .get_comment(comment_id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `POST /v1/comments`
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(input): JsonBody<NewCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let mut v = Validator::new();
    v.check(input.post_id > 0, "post_id", "must be a valid post_id");
    check_text(&mut v, &input.comment, "comment", MAX_COMMENT_CHARS);
    v.finish()?;

    let comment = match state
        .repository()
        .insert_comment(input.post_id, user.id, &input.comment)
        .await
    {
        Ok(comment) => comment,
        Err(StoreError::InvalidPostId) => return Err(ApiError::NotFound),
        Err(err) => return Err(err.into()),
    };

    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))))
}

/// `GET /v1/comments/{id}`
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let comment = find_comment(&state, parse_id(&id)?).await?;
    Ok(Json(json!({ "comment": comment })))
}

/// `PATCH /v1/comments/{id}`: owner-only, with optimistic concurrency.
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<EditCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let comment_id = parse_id(&id)?;

    let mut v = Validator::new();
    check_text(&mut v, &input.comment, "comment", MAX_COMMENT_CHARS);
    v.finish()?;

    let existing = find_comment(&state, comment_id).await?;
    ensure_owner(&user, existing.user_id)?;

    let comment = state
        .repository()
        .update_comment(comment_id, &input.comment, existing.updated_at)
        .await?;

    Ok(Json(json!({ "comment": comment })))
}

/// `DELETE /v1/comments/{id}`: owner-only.
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let comment_id = parse_id(&id)?;

    let existing = find_comment(&state, comment_id).await?;
    ensure_owner(&user, existing.user_id)?;

    state.repository().delete_comment(comment_id).await?;
    Ok(MessageResponse::new("comment successfully deleted"))
}

/// `GET /v1/posts/{id}/comments`: oldest first.
pub async fn list_post_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;
    let filter = params.into_filter(DEFAULT_PAGE_SIZE)?;

    find_post(&state, post_id).await?;

    let page = state
        .repository()
        .list_comments_for_post(post_id, &filter)
        .await?;

    Ok(Json(json!({
        "_metadata": Metadata::calculate(page.total_records, &filter),
        "comments": page.items,
    })))
}
