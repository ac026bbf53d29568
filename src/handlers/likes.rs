use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::StoreError;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::posts::find_post;
use super::shared_types::{parse_id, MessageResponse};

/// `POST /v1/posts/{id}/likes`
pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;

    let like = match state.repository().insert_like(post_id, user.id).await {
        Ok(like) => like,
        Err(err @ StoreError::AlreadyLiked) => return Err(ApiError::BadRequest(err.to_string())),
        Err(StoreError::InvalidPostId) => return Err(ApiError::NotFound),
        Err(err) => return Err(err.into()),
    };

    Ok((StatusCode::CREATED, Json(json!({ "like": like }))))
}

/// `DELETE /v1/posts/{id}/likes`: only ever removes the caller's own like.
pub async fn unlike_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;

    state.repository().delete_like(post_id, user.id).await?;
    Ok(MessageResponse::new("like successfully removed"))
}

/// `GET /v1/posts/{id}/likes`: `{"likes": <count>}`.
pub async fn count_likes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let post_id = parse_id(&id)?;
    find_post(&state, post_id).await?;

    let likes = state.repository().count_likes(post_id).await?;
    Ok(Json(json!({ "likes": likes })))
}
