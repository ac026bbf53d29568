// src/lib.rs
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod auth;
mod config;
mod error;
mod handlers;
mod infrastructure;
mod middleware;
mod validation;

// Hoist up only the public symbol(s)
pub use app_state::AppState;
pub use auth::{AuthUser, Identity, SCOPE_AUTHENTICATION, TOKEN_PLAINTEXT_LEN};
pub use config::*;
pub use error::{ApiError, INTERNAL_ERROR_MESSAGE};

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    connect_database, // ---
    create_memory_repository,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    MemoryRepository,
};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1_048_576;

/// Install the global tracing subscriber: fmt output filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
pub fn init_tracing() {
    // ---
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

/// Build the HTTP router around an already assembled [`AppState`].
///
/// Request pipeline, outermost first: panic recovery, request logging and metrics,
/// CORS, identity resolution, then the handler (whose `AuthUser` extractor and
/// ownership checks form the authorization gate).
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    // ---
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/v1/healthcheck", get(handlers::health_check))
        .route("/v1/users", post(handlers::create_user))
        .route("/v1/users/{username}", get(handlers::get_user))
        .route("/v1/users/{username}/posts", get(handlers::list_user_posts))
        .route("/v1/users/{username}/followers", get(handlers::list_followers))
        .route("/v1/users/{username}/following", get(handlers::list_following))
        .route(
            "/v1/tokens/authentication",
            post(handlers::create_authentication_token)
                .delete(handlers::delete_authentication_tokens),
        )
        .route("/v1/posts", post(handlers::create_post))
        .route(
            "/v1/posts/{id}",
            get(handlers::get_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/v1/posts/{id}/comments", get(handlers::list_post_comments))
        .route(
            "/v1/posts/{id}/likes",
            post(handlers::like_post)
                .delete(handlers::unlike_post)
                .get(handlers::count_likes),
        )
        .route("/v1/feed", get(handlers::feed))
        .route("/v1/comments", post(handlers::create_comment))
        .route(
            "/v1/comments/{id}",
            get(handlers::get_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
        .route("/v1/follows", post(handlers::follow_user))
        .route("/v1/follows/{user_id}", delete(handlers::unfollow_user))
        .fallback(|| async { ApiError::NotFound })
        .method_not_allowed_fallback(|| async { ApiError::MethodNotAllowed })
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(middleware::cors_layer(cors))
        .layer(from_fn_with_state(state.clone(), middleware::log_request))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Wire backends from configuration and build the router.
///
/// # Errors
/// Fails if the database cannot be reached or migrated, the metrics recorder cannot
/// be installed, or the configured hash cost is invalid.
pub async fn create_app(config: &AppConfig) -> Result<Router> {
    // ---
    let metrics = match config.server.metrics {
        MetricsBackend::Prometheus => create_prom_metrics()?,
        MetricsBackend::Noop => create_noop_metrics()?,
    };

    let repository: domain::RepositoryPtr = match config.server.store {
        StoreBackend::Postgres => {
            let db = config
                .database
                .as_ref()
                .context("Missing required configuration: DATABASE_URL")?;
            let pool = connect_database(db).await?;
            create_postgres_repository(pool, db.store_timeout)
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            let repository: domain::RepositoryPtr = create_memory_repository();
            repository
        }
    };

    let state = AppState::new(
        metrics,
        repository,
        &config.auth,
        config.server.environment.clone(),
    )?;

    Ok(build_router(state, &config.cors))
}
