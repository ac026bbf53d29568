//! Authentication: password hashing, bearer tokens and per-request identity.

mod base32;
mod identity;
mod password;
mod tokens;

use crate::domain::StoreError;
use std::time::Duration;

pub use identity::{
    authenticate, ensure_owner, is_public_route, resolve_identity, AuthUser, Identity,
};
pub use password::CredentialHasher;
pub use tokens::{
    hash_token, validate_plaintext, Token, TokenService, SCOPE_AUTHENTICATION, TOKEN_PLAINTEXT_LEN,
};

/// Failures inside the authentication layer.
///
/// `MalformedToken` and `NotFound` are the caller's fault; every other variant is a
/// server-side fault and must never surface as a 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ---
    #[error("token is not well formed")]
    MalformedToken,

    #[error("no unexpired token matches")]
    NotFound,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("system randomness unavailable: {0}")]
    Entropy(String),

    #[error("token ttl {0:?} is out of range")]
    TtlOutOfRange(Duration),

    #[error("failed to persist token")]
    Persistence(#[source] StoreError),

    #[error(transparent)]
    Store(StoreError),
}
