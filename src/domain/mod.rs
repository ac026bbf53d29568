mod metrics;
mod models;
mod pagination;
mod repository;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose persistence abstractions
pub use models::{
    Comment, CommentWithAuthor, Follow, FollowUser, Like, NewUser, Post, PostWithAuthor,
    TokenRecord, User, UserId,
};
pub use pagination::{Filter, Metadata, Page, MAX_PAGE, MAX_PAGE_SIZE};
pub use repository::{Repository, RepositoryPtr, StoreError, StoreResult};
