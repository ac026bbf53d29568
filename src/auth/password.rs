//! One-way salted password hashing.
//!
//! Argon2id with a per-password random salt, stored as a self-describing PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) so verification never depends on the
//! currently configured cost.

use super::AuthError;
use crate::config::HashCost;
use argon2::password_hash::{
    Error as PhcError, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// Salt length in bytes.
const SALT_BYTES: usize = 16;

/// Hashes and verifies passwords with a fixed Argon2id cost.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    // ---
    params: Params,
    /// Digest checked when there is no account, so both login branches cost one verify.
    decoy: String,
}

impl CredentialHasher {
    // ---
    /// Builds a hasher for the given cost.
    ///
    /// # Errors
    /// Returns [`AuthError::Hashing`] if the cost parameters are outside Argon2's limits.
    pub fn new(cost: &HashCost) -> Result<Self, AuthError> {
        // ---
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Hashing(format!("invalid argon2 parameters: {e}")))?;

        let mut hasher = Self {
            params,
            decoy: String::new(),
        };
        hasher.decoy = hasher.hash("starbloom-decoy-credential")?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        // ---
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `plaintext` under a fresh random salt.
    ///
    /// CPU and memory bound; async callers run it on the blocking pool.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        // ---
        let mut salt_bytes = [0u8; SALT_BYTES];
        getrandom::getrandom(&mut salt_bytes)
            .map_err(|e| AuthError::Hashing(format!("salt generation failed: {e}")))?;

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::Hashing(format!("salt encoding failed: {e}")))?;

        let phc = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        Ok(phc)
    }

    /// Check `plaintext` against a stored digest.
    ///
    /// A mismatch is `Ok(false)`; only a digest that cannot be parsed is an error.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, AuthError> {
        // ---
        let parsed = PasswordHash::new(digest)
            .map_err(|e| AuthError::Hashing(format!("malformed password digest: {e}")))?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(PhcError::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(e.to_string())),
        }
    }

    /// Like [`verify`](Self::verify), but a missing digest still pays for a full
    /// verification against the decoy and then reports a mismatch.
    pub fn verify_or_decoy(&self, plaintext: &str, digest: Option<&str>) -> Result<bool, AuthError> {
        // ---
        match digest {
            Some(digest) => self.verify(plaintext, digest),
            None => self.verify(plaintext, &self.decoy).map(|_| false),
        }
    }
}
