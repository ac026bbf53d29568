//! Bearer token issuance and resolution.
//!
//! A token is 16 bytes of OS randomness rendered as 26 characters of unpadded
//! base-32. Only the SHA-256 of that plaintext is stored, so a leaked `tokens` table
//! cannot be replayed, and the plaintext is handed to the client exactly once.

use super::{base32, AuthError};
use crate::domain::{RepositoryPtr, StoreError, TokenRecord, User, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Scope of tokens issued by the login flow and accepted by the identity middleware.
pub const SCOPE_AUTHENTICATION: &str = "authentication";

/// Length of every well-formed plaintext token.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Random bytes behind each token.
const TOKEN_ENTROPY_BYTES: usize = 16;

/// A freshly issued token. Serializes as `{"token": ..., "expiry": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    // ---
    #[serde(rename = "token")]
    pub plaintext: String,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: UserId,
    #[serde(skip)]
    pub scope: String,
}

impl Token {
    // ---
    fn record(&self) -> TokenRecord {
        // ---
        TokenRecord {
            hash: self.hash.clone(),
            user_id: self.user_id,
            expired_at: self.expiry,
            scope: self.scope.clone(),
        }
    }
}

/// SHA-256 of a plaintext token, as stored in `tokens.hash`.
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    // ---
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Cheap local shape check run before any store round trip.
pub fn validate_plaintext(plaintext: &str) -> Result<(), AuthError> {
    // ---
    if plaintext.is_empty() || plaintext.len() != TOKEN_PLAINTEXT_LEN {
        return Err(AuthError::MalformedToken);
    }
    Ok(())
}

/// Mint a token without persisting it.
fn generate(user_id: UserId, ttl: Duration, scope: &str, now: DateTime<Utc>) -> Result<Token, AuthError> {
    // ---
    let expiry = chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(AuthError::TtlOutOfRange(ttl))?;

    let mut random_bytes = [0u8; TOKEN_ENTROPY_BYTES];
    getrandom::getrandom(&mut random_bytes).map_err(|e| AuthError::Entropy(e.to_string()))?;

    let plaintext = base32::encode_no_pad(&random_bytes);
    let hash = hash_token(&plaintext);

    Ok(Token {
        plaintext,
        expiry,
        hash,
        user_id,
        scope: scope.to_string(),
    })
}

/// Issues, resolves and revokes bearer tokens against the shared repository.
#[derive(Clone)]
pub struct TokenService {
    // ---
    repository: RepositoryPtr,
}

impl TokenService {
    // ---
    pub fn new(repository: RepositoryPtr) -> Self {
        // ---
        Self { repository }
    }

    /// Issue a token alongside any tokens the user already holds.
    pub async fn issue(&self, user_id: UserId, ttl: Duration, scope: &str) -> Result<Token, AuthError> {
        // ---
        let token = generate(user_id, ttl, scope, Utc::now())?;

        self.repository
            .insert_token(&token.record())
            .await
            .map_err(AuthError::Persistence)?;

        tracing::debug!(user_id, scope, expiry = %token.expiry, "issued token");
        Ok(token)
    }

    /// Issue a token and drop every other token of `scope` the user holds, atomically.
    ///
    /// The user's already-expired tokens of any scope are purged in the same
    /// transaction.
    pub async fn issue_exclusive(
        &self,
        user_id: UserId,
        ttl: Duration,
        scope: &str,
    ) -> Result<Token, AuthError> {
        // ---
        let token = generate(user_id, ttl, scope, Utc::now())?;

        self.repository
            .replace_tokens(&token.record())
            .await
            .map_err(AuthError::Persistence)?;

        tracing::debug!(user_id, scope, expiry = %token.expiry, "issued exclusive token");
        Ok(token)
    }

    /// Delete every token of `scope` held by the user.
    pub async fn revoke_all(&self, user_id: UserId, scope: &str) -> Result<u64, AuthError> {
        // ---
        let removed = self
            .repository
            .delete_tokens_for_user(scope, user_id)
            .await
            .map_err(AuthError::Store)?;

        tracing::debug!(user_id, scope, removed, "revoked tokens");
        Ok(removed)
    }

    /// Resolve a presented plaintext to the owning user.
    pub async fn resolve(&self, scope: &str, plaintext: &str) -> Result<User, AuthError> {
        // ---
        self.resolve_at(scope, plaintext, Utc::now()).await
    }

    /// [`resolve`](Self::resolve) against an explicit clock.
    ///
    /// Never-issued and expired tokens both come back as [`AuthError::NotFound`].
    pub async fn resolve_at(
        &self,
        scope: &str,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        // ---
        validate_plaintext(plaintext)?;

        let hash = hash_token(plaintext);

        match self.repository.get_user_for_token(scope, &hash, now).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) | Err(StoreError::NotFound) => Err(AuthError::NotFound),
            Err(err) => Err(AuthError::Store(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{NewUser, Repository};
    use crate::infrastructure::create_memory_repository;
    use std::sync::Arc;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    async fn setup() -> (TokenService, Arc<crate::infrastructure::MemoryRepository>, User) {
        // ---
        let repo = create_memory_repository();
        let user = repo
            .insert_user(NewUser {
                username: "gandalf".to_string(),
                email: "gandalf@istari.example".to_string(),
                first_name: "Gandalf".to_string(),
                last_name: "Grey".to_string(),
                hashed_password: "unused".to_string(),
            })
            .await
            .unwrap();

        (TokenService::new(repo.clone()), repo, user)
    }

    #[test]
    fn generated_tokens_have_expected_shape() {
        // ---
        let now = Utc::now();
        let token = generate(42, DAY, SCOPE_AUTHENTICATION, now).unwrap();

        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert!(token
            .plaintext
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)));
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.hash.len(), 32);
        assert_eq!(token.expiry, now + chrono::Duration::hours(24));
        assert_eq!(token.user_id, 42);

        let other = generate(42, DAY, SCOPE_AUTHENTICATION, now).unwrap();
        assert_ne!(token.plaintext, other.plaintext);
    }

    #[test]
    fn absurd_ttl_is_rejected() {
        // ---
        let result = generate(1, Duration::from_secs(u64::MAX), SCOPE_AUTHENTICATION, Utc::now());
        assert!(matches!(result, Err(AuthError::TtlOutOfRange(_))));
    }

    #[test]
    fn serialized_token_exposes_only_plaintext_and_expiry() {
        // ---
        let token = generate(1, DAY, SCOPE_AUTHENTICATION, Utc::now()).unwrap();
        let json = serde_json::to_value(&token).unwrap();

        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(json["token"], token.plaintext);
        assert!(json.get("expiry").is_some());
    }

    #[test]
    fn plaintext_shape_check() {
        // ---
        assert!(matches!(validate_plaintext(""), Err(AuthError::MalformedToken)));
        assert!(matches!(
            validate_plaintext("TOOSHORT"),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            validate_plaintext(&"A".repeat(27)),
            Err(AuthError::MalformedToken)
        ));
        assert!(validate_plaintext(&"A".repeat(26)).is_ok());
    }

    #[tokio::test]
    async fn issued_token_resolves_until_expiry() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let token = tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await.unwrap();

        let resolved = tokens
            .resolve(SCOPE_AUTHENTICATION, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);

        let just_before = token.expiry - chrono::Duration::seconds(1);
        assert!(tokens
            .resolve_at(SCOPE_AUTHENTICATION, &token.plaintext, just_before)
            .await
            .is_ok());

        for at in [token.expiry, token.expiry + chrono::Duration::seconds(1)] {
            let result = tokens
                .resolve_at(SCOPE_AUTHENTICATION, &token.plaintext, at)
                .await;
            assert!(matches!(result, Err(AuthError::NotFound)));
        }
    }

    #[tokio::test]
    async fn never_issued_token_is_not_found() {
        // ---
        let (tokens, _repo, _user) = setup().await;
        let result = tokens
            .resolve(SCOPE_AUTHENTICATION, "ABCDEFGHIJKLMNOPQRSTUVWXYZ")
            .await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn scope_must_match() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let token = tokens.issue(user.id, DAY, "activation").await.unwrap();

        let result = tokens.resolve(SCOPE_AUTHENTICATION, &token.plaintext).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
        assert!(tokens.resolve("activation", &token.plaintext).await.is_ok());
    }

    #[tokio::test]
    async fn exclusive_issue_invalidates_previous_tokens() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let first = tokens
            .issue_exclusive(user.id, DAY, SCOPE_AUTHENTICATION)
            .await
            .unwrap();
        let second = tokens
            .issue_exclusive(user.id, DAY, SCOPE_AUTHENTICATION)
            .await
            .unwrap();

        let result = tokens.resolve(SCOPE_AUTHENTICATION, &first.plaintext).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
        assert!(tokens
            .resolve(SCOPE_AUTHENTICATION, &second.plaintext)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn exclusive_issue_leaves_other_scopes_alone() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let activation = tokens.issue(user.id, DAY, "activation").await.unwrap();
        tokens
            .issue_exclusive(user.id, DAY, SCOPE_AUTHENTICATION)
            .await
            .unwrap();

        assert!(tokens.resolve("activation", &activation.plaintext).await.is_ok());
    }

    #[tokio::test]
    async fn plain_issue_keeps_concurrent_sessions() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let first = tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await.unwrap();
        let second = tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await.unwrap();

        assert!(tokens.resolve(SCOPE_AUTHENTICATION, &first.plaintext).await.is_ok());
        assert!(tokens.resolve(SCOPE_AUTHENTICATION, &second.plaintext).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_all_logs_out_everywhere() {
        // ---
        let (tokens, _repo, user) = setup().await;
        let first = tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await.unwrap();
        tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await.unwrap();

        assert_eq!(tokens.revoke_all(user.id, SCOPE_AUTHENTICATION).await.unwrap(), 2);
        let result = tokens.resolve(SCOPE_AUTHENTICATION, &first.plaintext).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn malformed_token_never_reaches_the_store() {
        // ---
        let (tokens, repo, _user) = setup().await;
        repo.set_available(false);

        // The store is down, yet the shape check answers first.
        let result = tokens.resolve(SCOPE_AUTHENTICATION, "short").await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));

        let result = tokens.resolve(SCOPE_AUTHENTICATION, &"A".repeat(26)).await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn store_failure_on_issue_is_persistence_error() {
        // ---
        let (tokens, repo, user) = setup().await;
        repo.set_available(false);

        let result = tokens.issue(user.id, DAY, SCOPE_AUTHENTICATION).await;
        assert!(matches!(result, Err(AuthError::Persistence(_))));
    }
}
