use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

use crate::domain::{
    Comment, CommentWithAuthor, Filter, Follow, FollowUser, Like, NewUser, Page, Post,
    PostWithAuthor, Repository, StoreError, StoreResult, TokenRecord, User, UserId,
};

// ============================================================
// Row types
// ============================================================

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, hashed_password, activated, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    hashed_password: String,
    activated: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            hashed_password: r.hashed_password,
            activated: r.activated,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Self {
        Post {
            id: r.id,
            user_id: r.user_id,
            content: r.content,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Listing row: the post plus the window-function total.
#[derive(sqlx::FromRow)]
struct PagedPostRow {
    total: i64,
    #[sqlx(flatten)]
    post: PostRow,
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    total: i64,
    id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    username: String,
    first_name: String,
    last_name: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Comment {
            id: r.id,
            post_id: r.post_id,
            user_id: r.user_id,
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentAuthorRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    username: String,
    first_name: String,
    last_name: String,
}

impl From<CommentAuthorRow> for CommentWithAuthor {
    fn from(r: CommentAuthorRow) -> Self {
        CommentWithAuthor {
            id: r.id,
            post_id: r.post_id,
            user_id: r.user_id,
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
            username: r.username,
            first_name: r.first_name,
            last_name: r.last_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PagedCommentRow {
    total: i64,
    #[sqlx(flatten)]
    comment: CommentAuthorRow,
}

#[derive(sqlx::FromRow)]
struct FollowUserRow {
    total: i64,
    user_id: i64,
    username: String,
    first_name: String,
    last_name: String,
}

/// Split window-function rows into a [`Page`].
fn into_page<R, T>(rows: Vec<R>, total: impl Fn(&R) -> i64, map: impl Fn(R) -> T) -> Page<T> {
    // ---
    let total_records = rows.first().map(&total).unwrap_or(0).max(0) as u64;
    Page {
        items: rows.into_iter().map(map).collect(),
        total_records,
    }
}

// ============================================================
// Error mapping
// ============================================================

/// Map driver errors to [`StoreError`], keyed on the constraint names in `migrations/`.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    // ---
    let constraint = match &err {
        sqlx::Error::RowNotFound => return StoreError::NotFound,
        sqlx::Error::Database(db) => db.constraint().map(str::to_owned),
        _ => None,
    };

    match constraint.as_deref() {
        Some("users_email_key") => StoreError::DuplicateEmail,
        Some("users_username_key") => StoreError::DuplicateUsername,
        Some("unique_like") => StoreError::AlreadyLiked,
        Some("unique_follow") => StoreError::AlreadyFollowing,
        Some("comments_post_id_fkey" | "likes_post_id_fkey") => StoreError::InvalidPostId,
        Some("follows_user_id_fkey") => StoreError::InvalidUserId,
        _ => StoreError::Backend(err.into()),
    }
}

// ============================================================
// Repository
// ============================================================

pub struct PostgresRepository {
    // ---
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        // ---
        Self { pool, timeout }
    }

    /// Run one store operation under the configured deadline.
    async fn timed<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        // ---
        with_deadline(self.timeout, op).await
    }
}

/// Fails with [`StoreError::Timeout`] when `op` has not finished within `deadline`.
async fn with_deadline<T, F>(deadline: Duration, op: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    // ---
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => {
            tracing::warn!(timeout = ?deadline, "store operation timed out");
            Err(StoreError::Timeout(deadline))
        }
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn ping(&self) -> StoreResult<()> {
        // ---
        self.timed(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        // ---
        let query = format!(
            "INSERT INTO users (username, email, first_name, last_name, hashed_password)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );

        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&query)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(&user.hashed_password)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.into())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        // ---
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");

        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&query)
                    .bind(username)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(User::from))
    }

    async fn insert_token(&self, token: &TokenRecord) -> StoreResult<()> {
        // ---
        self.timed(
            sqlx::query(
                "INSERT INTO tokens (hash, user_id, expired_at, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expired_at)
            .bind(&token.scope)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn replace_tokens(&self, token: &TokenRecord) -> StoreResult<()> {
        // ---
        self.timed(async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "DELETE FROM tokens
                 WHERE user_id = $1 AND (scope = $2 OR expired_at <= NOW())",
            )
            .bind(token.user_id)
            .bind(&token.scope)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO tokens (hash, user_id, expired_at, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expired_at)
            .bind(&token.scope)
            .execute(&mut *tx)
            .await?;

            tx.commit().await
        })
        .await
    }

    async fn delete_tokens_for_user(&self, scope: &str, user_id: UserId) -> StoreResult<u64> {
        // ---
        let result = self
            .timed(
                sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                    .bind(scope)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_user_for_token(
        &self,
        scope: &str,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(
                    "SELECT u.id, u.username, u.email, u.first_name, u.last_name,
                            u.hashed_password, u.activated, u.created_at
                     FROM users u
                     INNER JOIN tokens t ON t.user_id = u.id
                     WHERE t.hash = $1 AND t.scope = $2 AND t.expired_at > $3",
                )
                .bind(hash)
                .bind(scope)
                .bind(now)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(User::from))
    }

    async fn insert_post(&self, user_id: UserId, content: &str) -> StoreResult<Post> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, PostRow>(
                    "INSERT INTO posts (user_id, content) VALUES ($1, $2)
                     RETURNING id, user_id, content, created_at, updated_at",
                )
                .bind(user_id)
                .bind(content)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.into())
    }

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, PostRow>(
                    "SELECT id, user_id, content, created_at, updated_at FROM posts WHERE id = $1",
                )
                .bind(post_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Post::from))
    }

    async fn update_post(
        &self,
        post_id: i64,
        content: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Post> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, PostRow>(
                    "UPDATE posts SET content = $1, updated_at = NOW()
                     WHERE id = $2 AND updated_at = $3
                     RETURNING id, user_id, content, created_at, updated_at",
                )
                .bind(content)
                .bind(post_id)
                .bind(expected_updated_at)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(Post::from).ok_or(StoreError::EditConflict)
    }

    async fn delete_post(&self, post_id: i64) -> StoreResult<()> {
        // ---
        let result = self
            .timed(
                sqlx::query("DELETE FROM posts WHERE id = $1")
                    .bind(post_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_posts_by_user(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<Post>> {
        // ---
        let rows = self
            .timed(
                sqlx::query_as::<_, PagedPostRow>(
                    "SELECT COUNT(*) OVER() AS total, id, user_id, content, created_at, updated_at
                     FROM posts
                     WHERE user_id = $1
                     ORDER BY created_at DESC, id DESC
                     LIMIT $2 OFFSET $3",
                )
                .bind(user_id)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(into_page(rows, |r| r.total, |r| r.post.into()))
    }

    async fn list_feed(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<PostWithAuthor>> {
        // ---
        let rows = self
            .timed(
                sqlx::query_as::<_, FeedRow>(
                    "SELECT COUNT(*) OVER() AS total,
                            p.id, p.user_id, p.content, p.created_at, p.updated_at,
                            u.username, u.first_name, u.last_name
                     FROM posts p
                     INNER JOIN users u ON p.user_id = u.id
                     WHERE p.user_id IN (SELECT user_id FROM follows WHERE follower_id = $1)
                     ORDER BY p.created_at DESC, p.id DESC
                     LIMIT $2 OFFSET $3",
                )
                .bind(follower_id)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(into_page(
            rows,
            |r| r.total,
            |r| PostWithAuthor {
                id: r.id,
                user_id: r.user_id,
                content: r.content,
                created_at: r.created_at,
                updated_at: r.updated_at,
                username: r.username,
                first_name: r.first_name,
                last_name: r.last_name,
            },
        ))
    }

    async fn insert_comment(
        &self,
        post_id: i64,
        user_id: UserId,
        comment: &str,
    ) -> StoreResult<Comment> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, CommentRow>(
                    "INSERT INTO comments (post_id, user_id, comment) VALUES ($1, $2, $3)
                     RETURNING id, post_id, user_id, comment, created_at, updated_at",
                )
                .bind(post_id)
                .bind(user_id)
                .bind(comment)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.into())
    }

    async fn get_comment(&self, comment_id: i64) -> StoreResult<Option<CommentWithAuthor>> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, CommentAuthorRow>(
                    "SELECT c.id, c.post_id, c.user_id, c.comment, c.created_at, c.updated_at,
                            u.username, u.first_name, u.last_name
                     FROM comments c
                     INNER JOIN users u ON c.user_id = u.id
                     WHERE c.id = $1",
                )
                .bind(comment_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(CommentWithAuthor::from))
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        comment: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Comment> {
        // ---
        let row = self
            .timed(
                sqlx::query_as::<_, CommentRow>(
                    "UPDATE comments SET comment = $1, updated_at = NOW()
                     WHERE id = $2 AND updated_at = $3
                     RETURNING id, post_id, user_id, comment, created_at, updated_at",
                )
                .bind(comment)
                .bind(comment_id)
                .bind(expected_updated_at)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(Comment::from).ok_or(StoreError::EditConflict)
    }

    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()> {
        // ---
        let result = self
            .timed(
                sqlx::query("DELETE FROM comments WHERE id = $1")
                    .bind(comment_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_comments_for_post(
        &self,
        post_id: i64,
        filter: &Filter,
    ) -> StoreResult<Page<CommentWithAuthor>> {
        // ---
        let rows = self
            .timed(
                sqlx::query_as::<_, PagedCommentRow>(
                    "SELECT COUNT(*) OVER() AS total,
                            c.id, c.post_id, c.user_id, c.comment, c.created_at, c.updated_at,
                            u.username, u.first_name, u.last_name
                     FROM comments c
                     INNER JOIN users u ON c.user_id = u.id
                     WHERE c.post_id = $1
                     ORDER BY c.created_at ASC, c.id ASC
                     LIMIT $2 OFFSET $3",
                )
                .bind(post_id)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(into_page(rows, |r| r.total, |r| r.comment.into()))
    }

    async fn insert_like(&self, post_id: i64, user_id: UserId) -> StoreResult<Like> {
        // ---
        let created_at = self
            .timed(
                sqlx::query_scalar::<_, DateTime<Utc>>(
                    "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) RETURNING created_at",
                )
                .bind(post_id)
                .bind(user_id)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(Like {
            post_id,
            user_id,
            created_at,
        })
    }

    async fn delete_like(&self, post_id: i64, user_id: UserId) -> StoreResult<()> {
        // ---
        let result = self
            .timed(
                sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_likes(&self, post_id: i64) -> StoreResult<u64> {
        // ---
        let count = self
            .timed(
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = $1")
                    .bind(post_id)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn insert_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<Follow> {
        // ---
        let created_at = self
            .timed(
                sqlx::query_scalar::<_, DateTime<Utc>>(
                    "INSERT INTO follows (user_id, follower_id) VALUES ($1, $2)
                     RETURNING created_at",
                )
                .bind(user_id)
                .bind(follower_id)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(Follow {
            user_id,
            follower_id,
            created_at,
        })
    }

    async fn delete_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        // ---
        let result = self
            .timed(
                sqlx::query("DELETE FROM follows WHERE user_id = $1 AND follower_id = $2")
                    .bind(user_id)
                    .bind(follower_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_followers(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<FollowUser>> {
        // ---
        let rows = self
            .timed(
                sqlx::query_as::<_, FollowUserRow>(
                    "SELECT COUNT(*) OVER() AS total,
                            u.id AS user_id, u.username, u.first_name, u.last_name
                     FROM users u
                     INNER JOIN follows f ON u.id = f.follower_id
                     WHERE f.user_id = $1
                     ORDER BY f.created_at DESC, f.follower_id DESC
                     LIMIT $2 OFFSET $3",
                )
                .bind(user_id)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(into_page(rows, |r| r.total, follow_user))
    }

    async fn list_following(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<FollowUser>> {
        // ---
        let rows = self
            .timed(
                sqlx::query_as::<_, FollowUserRow>(
                    "SELECT COUNT(*) OVER() AS total,
                            u.id AS user_id, u.username, u.first_name, u.last_name
                     FROM users u
                     INNER JOIN follows f ON u.id = f.user_id
                     WHERE f.follower_id = $1
                     ORDER BY f.created_at DESC, f.user_id DESC
                     LIMIT $2 OFFSET $3",
                )
                .bind(follower_id)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(into_page(rows, |r| r.total, follow_user))
    }
}

fn follow_user(r: FollowUserRow) -> FollowUser {
    FollowUser {
        user_id: r.user_id,
        username: r.username,
        first_name: r.first_name,
        last_name: r.last_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::infrastructure::database::connect_database;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn stalled_operation_fails_with_timeout() {
        // ---
        let result: StoreResult<()> =
            with_deadline(SHORT, std::future::pending::<Result<(), sqlx::Error>>()).await;

        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == SHORT));
    }

    #[tokio::test]
    async fn finished_operation_passes_through() {
        // ---
        let ok = with_deadline(SHORT, async { Ok::<_, sqlx::Error>(7) }).await;
        assert!(matches!(ok, Ok(7)));

        let missing: StoreResult<()> =
            with_deadline(SHORT, async { Err(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn slow_query_hits_the_store_deadline() {
        // ---
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping store deadline test");
            return;
        };

        let config = DatabaseConfig {
            database_url,
            retry_count: 3,
            acquire_timeout: Duration::from_secs(5),
            min_connections: 1,
            max_connections: 2,
            store_timeout: SHORT,
        };
        let pool = connect_database(&config)
            .await
            .expect("Failed to connect to test database");
        let repo = PostgresRepository::new(pool, config.store_timeout);

        let result = repo
            .timed(sqlx::query("SELECT pg_sleep(1)").execute(&repo.pool))
            .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));

        // A quick query still succeeds under the same deadline.
        repo.ping().await.expect("ping");
    }
}
