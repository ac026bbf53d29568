mod postgres_repository;

use crate::config::DatabaseConfig;
use crate::domain::RepositoryPtr;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub use postgres_repository::PostgresRepository;

/// Delay between connection attempts while the database comes up.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect to PostgreSQL, retrying while the server is unreachable, then apply the
/// embedded migrations.
///
/// # Errors
/// Fails once `retry_count` attempts are exhausted or if a migration fails.
pub async fn connect_database(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let attempts = config.retry_count.max(1);
    let mut attempt = 0;

    let pool = loop {
        attempt += 1;

        let result = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => break pool,
            Err(err) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %err, "database not ready, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => {
                return Err(err).context(format!(
                    "failed to connect to database after {attempts} attempts"
                ))
            }
        }
    };

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    tracing::info!(attempt, "database connected and migrated");
    Ok(pool)
}

pub fn create_postgres_repository(pool: PgPool, store_timeout: Duration) -> RepositoryPtr {
    // ---
    Arc::new(PostgresRepository::new(pool, store_timeout))
}
