use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Starbloom API 👋
Version: {version}

Available endpoints:
  - GET    /v1/healthcheck[?mode=full]        - Health check (full mode pings the store)
  - POST   /v1/users                          - Sign up
  - GET    /v1/users/{{username}}               - Fetch a user
  - POST   /v1/tokens/authentication          - Log in, returns a bearer token
  - DELETE /v1/tokens/authentication          - Log out everywhere
  - POST   /v1/posts                          - Create a post
  - GET    /v1/posts/{{id}}                     - Fetch a post
  - PATCH  /v1/posts/{{id}}                     - Edit your post
  - DELETE /v1/posts/{{id}}                     - Delete your post
  - GET    /v1/users/{{username}}/posts         - A user's posts
  - GET    /v1/feed                           - Posts from people you follow
  - POST   /v1/comments                       - Comment on a post
  - GET    /v1/comments/{{id}}                  - Fetch a comment
  - PATCH  /v1/comments/{{id}}                  - Edit your comment
  - DELETE /v1/comments/{{id}}                  - Delete your comment
  - GET    /v1/posts/{{id}}/comments            - A post's comments
  - POST   /v1/posts/{{id}}/likes               - Like a post
  - DELETE /v1/posts/{{id}}/likes               - Remove your like
  - GET    /v1/posts/{{id}}/likes               - Like count
  - POST   /v1/follows                        - Follow a user
  - DELETE /v1/follows/{{user_id}}              - Unfollow a user
  - GET    /v1/users/{{username}}/followers     - Followers
  - GET    /v1/users/{{username}}/following     - Followed users
  - GET    /metrics                           - Prometheus metrics

Authenticated endpoints expect `Authorization: Bearer <token>`.
"#
    )
}
