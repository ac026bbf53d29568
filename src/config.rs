// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. Appropriate for tuning parameters where
/// fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// `database` is only present when the PostgreSQL store is selected.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: server::ServerConfig,
    pub database: Option<database::DatabaseConfig>,
    pub auth: auth::AuthConfig,
    pub cors: cors::CorsConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        let server = server::ServerConfig::from_env()?;

        let database = match server.store {
            StoreBackend::Postgres => Some(database::DatabaseConfig::from_env()?),
            StoreBackend::Memory => None,
        };

        Ok(Self {
            server,
            database,
            auth: auth::AuthConfig::from_env(),
            cors: cors::CorsConfig::from_env(),
        })
    }
}

// ============================================================
// Server configuration
// ============================================================

mod server {
    // ---
    use super::*;

    /// Which [`Repository`](crate::domain::Repository) implementation backs the service.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum StoreBackend {
        Postgres,
        Memory,
    }

    impl std::str::FromStr for StoreBackend {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            // ---
            match s {
                "postgres" => Ok(Self::Postgres),
                "memory" => Ok(Self::Memory),
                other => anyhow::bail!(
                    "Invalid configuration: STARBLOOM_STORE must be 'postgres' or 'memory', got '{other}'"
                ),
            }
        }
    }

    /// Which [`Metrics`](crate::domain::Metrics) implementation records events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MetricsBackend {
        Prometheus,
        Noop,
    }

    /// Process-level settings: where to listen and what to wire in.
    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Socket address to bind. Defaults to `127.0.0.1:4000`.
        pub bind_addr: String,

        /// Deployment environment name, reported by the healthcheck. Defaults to `development`.
        pub environment: String,

        pub store: StoreBackend,

        pub metrics: MetricsBackend,
    }

    impl ServerConfig {
        /// Builds a [`ServerConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if `STARBLOOM_STORE` names an unknown backend.
        pub fn from_env() -> Result<Self> {
            // ---
            let bind_addr =
                std::env::var("STARBLOOM_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:4000".to_string());
            let environment =
                std::env::var("STARBLOOM_ENV").unwrap_or_else(|_| "development".to_string());

            let store = match std::env::var("STARBLOOM_STORE") {
                Ok(value) => value.parse()?,
                Err(_) => StoreBackend::Postgres,
            };

            // Anything but "prom" keeps metrics off.
            let metrics = match std::env::var("STARBLOOM_METRICS_TYPE").as_deref() {
                Ok("prom") => MetricsBackend::Prometheus,
                _ => MetricsBackend::Noop,
            };

            Ok(Self {
                bind_addr,
                environment,
                store,
                metrics,
            })
        }
    }
}
pub use server::{MetricsBackend, ServerConfig, StoreBackend};

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections open concurrently. Defaults to 15.
        pub max_connections: u32,

        /// Upper bound on any single store operation. Defaults to 3 seconds.
        pub store_timeout: Duration,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if `DATABASE_URL` is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("STARBLOOM_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs =
                optional_env_parse!("STARBLOOM_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("STARBLOOM_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("STARBLOOM_DB_MAX_CONNECTIONS", u32, 15);
            let store_timeout_ms = optional_env_parse!("STARBLOOM_STORE_TIMEOUT_MS", u64, 3000);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
                store_timeout: Duration::from_millis(store_timeout_ms),
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Authentication configuration
// ============================================================

mod auth {
    // ---
    use super::*;

    /// Argon2id cost parameters.
    ///
    /// Defaults follow the OWASP baseline (19 MiB, 2 passes, 1 lane). Stored digests
    /// carry their own parameters, so raising these never locks existing users out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HashCost {
        pub memory_kib: u32,
        pub iterations: u32,
        pub parallelism: u32,
    }

    impl Default for HashCost {
        fn default() -> Self {
            // ---
            Self {
                memory_kib: 19_456,
                iterations: 2,
                parallelism: 1,
            }
        }
    }

    /// Token lifetime and password hashing settings.
    #[derive(Debug, Clone)]
    pub struct AuthConfig {
        /// Lifetime of authentication tokens. Defaults to 24 hours.
        pub token_ttl: Duration,

        /// When true, a login invalidates the user's other authentication tokens.
        pub single_session: bool,

        pub hash_cost: HashCost,
    }

    impl Default for AuthConfig {
        fn default() -> Self {
            // ---
            Self {
                token_ttl: Duration::from_secs(24 * 60 * 60),
                single_session: true,
                hash_cost: HashCost::default(),
            }
        }
    }

    impl AuthConfig {
        /// Builds an [`AuthConfig`] from environment variables. Every key is optional.
        pub fn from_env() -> Self {
            // ---
            let defaults = HashCost::default();
            let ttl_hours = optional_env_parse!("STARBLOOM_TOKEN_TTL_HOURS", u64, 24);

            Self {
                token_ttl: Duration::from_secs(ttl_hours * 60 * 60),
                single_session: optional_env_parse!("STARBLOOM_SINGLE_SESSION", bool, true),
                hash_cost: HashCost {
                    memory_kib: optional_env_parse!(
                        "STARBLOOM_ARGON2_MEMORY_KIB",
                        u32,
                        defaults.memory_kib
                    ),
                    iterations: optional_env_parse!(
                        "STARBLOOM_ARGON2_ITERATIONS",
                        u32,
                        defaults.iterations
                    ),
                    parallelism: optional_env_parse!(
                        "STARBLOOM_ARGON2_PARALLELISM",
                        u32,
                        defaults.parallelism
                    ),
                },
            }
        }
    }
}
pub use auth::{AuthConfig, HashCost};

// ============================================================
// CORS configuration
// ============================================================

mod cors {
    // ---

    /// Cross-origin settings. An empty list disables CORS headers entirely.
    #[derive(Debug, Clone, Default)]
    pub struct CorsConfig {
        pub trusted_origins: Vec<String>,
    }

    impl CorsConfig {
        /// Reads `STARBLOOM_CORS_TRUSTED_ORIGINS` as a space-separated origin list.
        pub fn from_env() -> Self {
            // ---
            let trusted_origins = std::env::var("STARBLOOM_CORS_TRUSTED_ORIGINS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();

            Self { trusted_origins }
        }
    }
}
pub use cors::CorsConfig;

// ============================================================
// Tests
// ============================================================
