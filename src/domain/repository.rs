use super::models::{
    Comment, CommentWithAuthor, Follow, FollowUser, Like, NewUser, Post, PostWithAuthor,
    TokenRecord, User, UserId,
};
use super::pagination::{Filter, Page};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Failures surfaced by a [`Repository`] backend.
///
/// Constraint violations are mapped to dedicated variants so handlers can turn them
/// into field-level responses; everything else is an opaque backend error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // ---
    #[error("record not found")]
    NotFound,

    #[error("a user with this email already exists")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("already liked")]
    AlreadyLiked,

    #[error("already following")]
    AlreadyFollowing,

    #[error("referenced post does not exist")]
    InvalidPostId,

    #[error("referenced user does not exist")]
    InvalidUserId,

    #[error("edit conflict")]
    EditConflict,

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Abstraction over the relational store backing every table.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Round-trip to the backend; used by the full health check.
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    // Tokens

    /// Persist a token alongside any existing ones.
    async fn insert_token(&self, token: &TokenRecord) -> StoreResult<()>;

    /// Atomically delete every token the user holds in `token.scope` (plus any of the
    /// user's already-expired tokens) and insert `token`.
    async fn replace_tokens(&self, token: &TokenRecord) -> StoreResult<()>;

    /// Delete every token of `scope` held by the user, returning how many were removed.
    async fn delete_tokens_for_user(&self, scope: &str, user_id: UserId) -> StoreResult<u64>;

    /// Find the owner of a live token: hash and scope match and `expired_at > now`.
    async fn get_user_for_token(
        &self,
        scope: &str,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    // Posts

    async fn insert_post(&self, user_id: UserId, content: &str) -> StoreResult<Post>;

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>>;

    /// Update content only if the row still carries `expected_updated_at`;
    /// otherwise [`StoreError::EditConflict`].
    async fn update_post(
        &self,
        post_id: i64,
        content: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Post>;

    async fn delete_post(&self, post_id: i64) -> StoreResult<()>;

    /// Posts by one author, newest first.
    async fn list_posts_by_user(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<Post>>;

    /// Posts by everyone `follower_id` follows, newest first.
    async fn list_feed(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<PostWithAuthor>>;

    // Comments

    async fn insert_comment(
        &self,
        post_id: i64,
        user_id: UserId,
        comment: &str,
    ) -> StoreResult<Comment>;

    async fn get_comment(&self, comment_id: i64) -> StoreResult<Option<CommentWithAuthor>>;

    async fn update_comment(
        &self,
        comment_id: i64,
        comment: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Comment>;

    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()>;

    /// Comments on one post, oldest first.
    async fn list_comments_for_post(
        &self,
        post_id: i64,
        filter: &Filter,
    ) -> StoreResult<Page<CommentWithAuthor>>;

    // Likes

    async fn insert_like(&self, post_id: i64, user_id: UserId) -> StoreResult<Like>;

    async fn delete_like(&self, post_id: i64, user_id: UserId) -> StoreResult<()>;

    async fn count_likes(&self, post_id: i64) -> StoreResult<u64>;

    // Follows

    async fn insert_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<Follow>;

    async fn delete_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()>;

    /// Users following `user_id`.
    async fn list_followers(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<FollowUser>>;

    /// Users that `follower_id` follows.
    async fn list_following(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<FollowUser>>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;
