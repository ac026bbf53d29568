//! Process-local [`Repository`] used for development and the test suites.
//!
//! Mirrors the PostgreSQL schema's guarantees: unique usernames and emails, the
//! `unique_like` / `unique_follow` constraints, foreign keys with cascading deletes,
//! and optimistic concurrency on `updated_at`. Timestamps are truncated to
//! microseconds to match `TIMESTAMPTZ`.

use crate::domain::{
    Comment, CommentWithAuthor, Filter, Follow, FollowUser, Like, NewUser, Page, Post,
    PostWithAuthor, Repository, StoreError, StoreResult, TokenRecord, User, UserId,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub fn create_memory_repository() -> Arc<MemoryRepository> {
    // ---
    Arc::new(MemoryRepository::new())
}

#[derive(Default)]
struct Tables {
    // ---
    next_user_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
    users: BTreeMap<UserId, User>,
    tokens: Vec<TokenRecord>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    likes: Vec<Like>,
    follows: Vec<Follow>,
}

impl Tables {
    // ---
    fn user(&self, user_id: UserId) -> StoreResult<&User> {
        // ---
        self.users.get(&user_id).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("dangling user reference {user_id}"))
        })
    }

    fn with_author(&self, comment: &Comment) -> StoreResult<CommentWithAuthor> {
        // ---
        let author = self.user(comment.user_id)?;
        Ok(CommentWithAuthor {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            comment: comment.comment.clone(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            username: author.username.clone(),
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
        })
    }

    fn follow_user(&self, user_id: UserId) -> StoreResult<FollowUser> {
        // ---
        let user = self.user(user_id)?;
        Ok(FollowUser {
            user_id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        })
    }

    /// Cascade a post delete into its comments and likes.
    fn remove_post(&mut self, post_id: i64) -> bool {
        // ---
        if self.posts.remove(&post_id).is_none() {
            return false;
        }
        self.comments.retain(|_, c| c.post_id != post_id);
        self.likes.retain(|l| l.post_id != post_id);
        true
    }
}

/// In-memory store guarded by a single mutex. No lock is ever held across an await.
pub struct MemoryRepository {
    // ---
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    // ---
    pub fn new() -> Self {
        // ---
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a backend outage: while unavailable every call fails with
    /// [`StoreError::Backend`].
    pub fn set_available(&self, available: bool) {
        // ---
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored tokens of any scope held by `user_id`, expired ones included.
    pub fn token_count(&self, user_id: UserId) -> usize {
        // ---
        self.tables
            .lock()
            .map(|t| t.tokens.iter().filter(|tok| tok.user_id == user_id).count())
            .unwrap_or(0)
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        // ---
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "memory store is unavailable"
            )));
        }

        self.tables
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }
}

/// Current time at `TIMESTAMPTZ` precision.
fn now() -> DateTime<Utc> {
    // ---
    Utc::now().trunc_subsecs(6)
}

/// A fresh `updated_at` strictly after `previous`, so every edit changes the version.
fn next_version(previous: DateTime<Utc>) -> DateTime<Utc> {
    // ---
    let now = now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

/// Apply `filter` to already-ordered rows. An out-of-range page reports zero rows in
/// total, matching `COUNT(*) OVER()` on an empty result set.
fn paginate<T>(rows: Vec<T>, filter: &Filter) -> Page<T> {
    // ---
    let total = rows.len() as u64;
    let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(filter.limit()).unwrap_or(usize::MAX);

    let items: Vec<T> = rows.into_iter().skip(offset).take(limit).collect();
    if items.is_empty() {
        return Page::empty();
    }

    Page {
        items,
        total_records: total,
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn ping(&self) -> StoreResult<()> {
        // ---
        self.tables().map(|_| ())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        // ---
        let mut t = self.tables()?;

        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }

        t.next_user_id += 1;
        let created = User {
            id: t.next_user_id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            hashed_password: user.hashed_password,
            activated: false,
            created_at: now(),
        };
        t.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        // ---
        let t = self.tables()?;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_token(&self, token: &TokenRecord) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        if !t.users.contains_key(&token.user_id) {
            return Err(StoreError::InvalidUserId);
        }
        t.tokens.push(token.clone());
        Ok(())
    }

    async fn replace_tokens(&self, token: &TokenRecord) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        if !t.users.contains_key(&token.user_id) {
            return Err(StoreError::InvalidUserId);
        }

        let now = Utc::now();
        t.tokens.retain(|existing| {
            existing.user_id != token.user_id
                || (existing.scope != token.scope && existing.expired_at > now)
        });
        t.tokens.push(token.clone());
        Ok(())
    }

    async fn delete_tokens_for_user(&self, scope: &str, user_id: UserId) -> StoreResult<u64> {
        // ---
        let mut t = self.tables()?;
        let before = t.tokens.len();
        t.tokens
            .retain(|existing| !(existing.user_id == user_id && existing.scope == scope));
        Ok((before - t.tokens.len()) as u64)
    }

    async fn get_user_for_token(
        &self,
        scope: &str,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        // ---
        let t = self.tables()?;
        let owner = t
            .tokens
            .iter()
            .find(|tok| tok.hash == hash && tok.scope == scope && tok.expired_at > now)
            .and_then(|tok| t.users.get(&tok.user_id))
            .cloned();
        Ok(owner)
    }

    async fn insert_post(&self, user_id: UserId, content: &str) -> StoreResult<Post> {
        // ---
        let mut t = self.tables()?;
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::InvalidUserId);
        }

        t.next_post_id += 1;
        let created_at = now();
        let post = Post {
            id: t.next_post_id,
            user_id,
            content: content.to_string(),
            created_at,
            updated_at: created_at,
        };
        t.posts.insert(post.id, post.clone());

        Ok(post)
    }

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>> {
        // ---
        let t = self.tables()?;
        Ok(t.posts.get(&post_id).cloned())
    }

    async fn update_post(
        &self,
        post_id: i64,
        content: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Post> {
        // ---
        let mut t = self.tables()?;
        let post = t.posts.get_mut(&post_id).ok_or(StoreError::EditConflict)?;
        if post.updated_at != expected_updated_at {
            return Err(StoreError::EditConflict);
        }

        post.content = content.to_string();
        post.updated_at = next_version(post.updated_at);
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: i64) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        if t.remove_post(post_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn list_posts_by_user(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<Post>> {
        // ---
        let t = self.tables()?;
        let mut rows: Vec<Post> = t
            .posts
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(rows, filter))
    }

    async fn list_feed(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<PostWithAuthor>> {
        // ---
        let t = self.tables()?;
        let followed: HashSet<UserId> = t
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.user_id)
            .collect();

        let mut rows = Vec::new();
        for post in t.posts.values().filter(|p| followed.contains(&p.user_id)) {
            let author = t.user(post.user_id)?;
            rows.push(PostWithAuthor {
                id: post.id,
                user_id: post.user_id,
                content: post.content.clone(),
                created_at: post.created_at,
                updated_at: post.updated_at,
                username: author.username.clone(),
                first_name: author.first_name.clone(),
                last_name: author.last_name.clone(),
            });
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(rows, filter))
    }

    async fn insert_comment(
        &self,
        post_id: i64,
        user_id: UserId,
        comment: &str,
    ) -> StoreResult<Comment> {
        // ---
        let mut t = self.tables()?;
        if !t.posts.contains_key(&post_id) {
            return Err(StoreError::InvalidPostId);
        }
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::InvalidUserId);
        }

        t.next_comment_id += 1;
        let created_at = now();
        let row = Comment {
            id: t.next_comment_id,
            post_id,
            user_id,
            comment: comment.to_string(),
            created_at,
            updated_at: created_at,
        };
        t.comments.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_comment(&self, comment_id: i64) -> StoreResult<Option<CommentWithAuthor>> {
        // ---
        let t = self.tables()?;
        match t.comments.get(&comment_id) {
            Some(comment) => t.with_author(comment).map(Some),
            None => Ok(None),
        }
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        comment: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<Comment> {
        // ---
        let mut t = self.tables()?;
        let row = t
            .comments
            .get_mut(&comment_id)
            .ok_or(StoreError::EditConflict)?;
        if row.updated_at != expected_updated_at {
            return Err(StoreError::EditConflict);
        }

        row.comment = comment.to_string();
        row.updated_at = next_version(row.updated_at);
        Ok(row.clone())
    }

    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        t.comments
            .remove(&comment_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_comments_for_post(
        &self,
        post_id: i64,
        filter: &Filter,
    ) -> StoreResult<Page<CommentWithAuthor>> {
        // ---
        let t = self.tables()?;
        let mut ordered: Vec<&Comment> =
            t.comments.values().filter(|c| c.post_id == post_id).collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let rows = ordered
            .into_iter()
            .map(|c| t.with_author(c))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(paginate(rows, filter))
    }

    async fn insert_like(&self, post_id: i64, user_id: UserId) -> StoreResult<Like> {
        // ---
        let mut t = self.tables()?;
        if !t.posts.contains_key(&post_id) {
            return Err(StoreError::InvalidPostId);
        }
        if t
            .likes
            .iter()
            .any(|l| l.post_id == post_id && l.user_id == user_id)
        {
            return Err(StoreError::AlreadyLiked);
        }

        let like = Like {
            post_id,
            user_id,
            created_at: now(),
        };
        t.likes.push(like.clone());
        Ok(like)
    }

    async fn delete_like(&self, post_id: i64, user_id: UserId) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        let before = t.likes.len();
        t.likes
            .retain(|l| !(l.post_id == post_id && l.user_id == user_id));

        if t.likes.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_likes(&self, post_id: i64) -> StoreResult<u64> {
        // ---
        let t = self.tables()?;
        Ok(t.likes.iter().filter(|l| l.post_id == post_id).count() as u64)
    }

    async fn insert_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<Follow> {
        // ---
        let mut t = self.tables()?;
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::InvalidUserId);
        }
        if user_id == follower_id {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "violates check constraint no_self_follow"
            )));
        }
        if t
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.follower_id == follower_id)
        {
            return Err(StoreError::AlreadyFollowing);
        }

        let follow = Follow {
            user_id,
            follower_id,
            created_at: now(),
        };
        t.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        // ---
        let mut t = self.tables()?;
        let before = t.follows.len();
        t.follows
            .retain(|f| !(f.user_id == user_id && f.follower_id == follower_id));

        if t.follows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_followers(&self, user_id: UserId, filter: &Filter) -> StoreResult<Page<FollowUser>> {
        // ---
        let t = self.tables()?;
        let mut edges: Vec<&Follow> = t.follows.iter().filter(|f| f.user_id == user_id).collect();
        edges.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.follower_id.cmp(&a.follower_id))
        });

        let rows = edges
            .into_iter()
            .map(|f| t.follow_user(f.follower_id))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(paginate(rows, filter))
    }

    async fn list_following(
        &self,
        follower_id: UserId,
        filter: &Filter,
    ) -> StoreResult<Page<FollowUser>> {
        // ---
        let t = self.tables()?;
        let mut edges: Vec<&Follow> = t
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.user_id.cmp(&a.user_id)));

        let rows = edges
            .into_iter()
            .map(|f| t.follow_user(f.user_id))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(paginate(rows, filter))
    }
}
