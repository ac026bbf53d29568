//! Application state management.
//!
//! This module defines the shared state structure passed to all Axum handlers via
//! the `State` extractor. `AppState` holds the repository, metrics, password hasher
//! and token service. Every field is cheap to clone (`Arc` inside), so Axum clones
//! the whole struct per request.

use crate::auth::{AuthError, CredentialHasher, TokenService};
use crate::config::AuthConfig;
use crate::domain::{MetricsPtr, RepositoryPtr};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state passed to all Axum handlers.
///
/// Handlers depend on the `Repository` and `Metrics` abstractions, never on concrete
/// backends. State is built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    /// Metrics implementation: Prometheus-backed or no-op.
    metrics: MetricsPtr,

    /// Repository abstraction for persistent storage.
    repository: RepositoryPtr,

    /// Argon2id hasher with the configured cost.
    hasher: Arc<CredentialHasher>,

    /// Issues and resolves bearer tokens against `repository`.
    tokens: TokenService,

    /// Lifetime of authentication tokens.
    token_ttl: Duration,

    /// Whether a login replaces the user's other authentication tokens.
    single_session: bool,

    /// Deployment environment name, reported by the healthcheck.
    environment: String,
}

impl AppState {
    // ---

    /// # Errors
    /// Fails if the configured hash cost is outside Argon2's limits.
    pub fn new(
        metrics: MetricsPtr,
        repository: RepositoryPtr,
        auth: &AuthConfig,
        environment: impl Into<String>,
    ) -> Result<Self, AuthError> {
        // ---
        let hasher = Arc::new(CredentialHasher::new(&auth.hash_cost)?);
        let tokens = TokenService::new(repository.clone());

        Ok(AppState {
            metrics,
            repository,
            hasher,
            tokens,
            token_ttl: auth.token_ttl,
            single_session: auth.single_session,
            environment: environment.into(),
        })
    }

    /// Get a reference to the metrics implementation.
    pub fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    pub fn tokens(&self) -> &TokenService {
        // ---
        &self.tokens
    }

    pub fn token_ttl(&self) -> Duration {
        // ---
        self.token_ttl
    }

    pub fn single_session(&self) -> bool {
        // ---
        self.single_session
    }

    pub fn environment(&self) -> &str {
        // ---
        &self.environment
    }

    /// Hash a password on the blocking pool so request workers stay responsive.
    pub async fn hash_password(&self, plaintext: String) -> Result<String, AuthError> {
        // ---
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AuthError::Hashing(format!("hashing task failed: {e}")))?
    }

    /// Verify a password on the blocking pool. A mismatch is `Ok(false)`.
    ///
    /// With no digest (unknown account) the same work is done against a decoy and the
    /// result is always `Ok(false)`.
    pub async fn verify_password(
        &self,
        plaintext: String,
        digest: Option<String>,
    ) -> Result<bool, AuthError> {
        // ---
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_or_decoy(&plaintext, digest.as_deref()))
            .await
            .map_err(|e| AuthError::Hashing(format!("verification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::HashCost;
    use crate::infrastructure::{create_memory_repository, create_noop_metrics};

    fn cheap_auth() -> AuthConfig {
        // ---
        AuthConfig {
            hash_cost: HashCost {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_app_state_creation_and_clone() {
        // ---
        let metrics = create_noop_metrics().unwrap();
        let state = AppState::new(metrics, create_memory_repository(), &cheap_auth(), "test").unwrap();
        let cloned = state.clone();

        assert_eq!(cloned.environment(), "test");
        assert_eq!(cloned.token_ttl(), Duration::from_secs(24 * 60 * 60));
        assert!(cloned.single_session());
        let _metrics_ref = state.metrics();
        let _repo_ref = state.repository();
    }

    #[test]
    fn test_invalid_hash_cost_is_rejected() {
        // ---
        let mut auth = cheap_auth();
        auth.hash_cost.iterations = 0;

        let metrics = create_noop_metrics().unwrap();
        let result = AppState::new(metrics, create_memory_repository(), &auth, "test");
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_password_helpers_run_off_thread() {
        // ---
        let metrics = create_noop_metrics().unwrap();
        let state = AppState::new(metrics, create_memory_repository(), &cheap_auth(), "test").unwrap();

        let digest = state.hash_password("speak friend".to_string()).await.unwrap();
        assert!(state
            .verify_password("speak friend".to_string(), Some(digest.clone()))
            .await
            .unwrap());
        assert!(!state
            .verify_password("and enter".to_string(), Some(digest))
            .await
            .unwrap());
        assert!(!state
            .verify_password("speak friend".to_string(), None)
            .await
            .unwrap());
    }
}
