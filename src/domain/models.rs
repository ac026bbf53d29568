use chrono::{DateTime, Utc};
use serde::Serialize;

/// Primary key type shared by every table.
pub type UserId = i64;

/// A registered account.
///
/// The password hash is carried so the login flow can verify against it, but it is
/// never serialized into a response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    // ---
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub hashed_password: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

/// Signup payload after validation and hashing; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewUser {
    // ---
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub hashed_password: String,
}

/// Persisted half of a bearer token. The plaintext never reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    // ---
    /// SHA-256 digest of the plaintext token.
    pub hash: Vec<u8>,
    pub user_id: UserId,
    pub expired_at: DateTime<Utc>,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Post {
    // ---
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post joined with its author, as shown in the following feed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostWithAuthor {
    // ---
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Comment {
    // ---
    pub id: i64,
    pub post_id: i64,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment joined with its author.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentWithAuthor {
    // ---
    pub id: i64,
    pub post_id: i64,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Like {
    // ---
    pub post_id: i64,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// `follower_id` follows `user_id`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Follow {
    // ---
    pub user_id: UserId,
    pub follower_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Public summary of a user in follower/following listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FollowUser {
    // ---
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn user_serialization_never_contains_password_hash() {
        // ---
        let user = User {
            id: 7,
            username: "bilbo".to_string(),
            email: "bilbo@shire.example".to_string(),
            first_name: "Bilbo".to_string(),
            last_name: "Baggins".to_string(),
            hashed_password: "$argon2id$v=19$secret".to_string(),
            activated: false,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert!(!json.to_string().contains("argon2id"));
        assert_eq!(json["username"], "bilbo");
    }
}
