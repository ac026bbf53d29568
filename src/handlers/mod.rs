// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod comments;
mod follows;
mod health;
mod likes;
mod metrics;
mod posts;
mod root;
mod shared_types;
mod tokens;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::metrics_handler;
pub use root::root_handler;

// Accounts and sessions
pub use tokens::{create_authentication_token, delete_authentication_tokens};
pub use users::{create_user, get_user};

// Posts and the following feed
pub use posts::{create_post, delete_post, feed, get_post, list_user_posts, update_post};

// Comments
pub use comments::{create_comment, delete_comment, get_comment, list_post_comments, update_comment};

// Likes
pub use likes::{count_likes, like_post, unlike_post};

// Follows
pub use follows::{follow_user, list_followers, list_following, unfollow_user};
