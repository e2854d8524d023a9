//! PostgreSQL pool wrapper.

use crate::config::PostgresConfig;
use lead_core::{dsn, supervisor, Dependency, Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use telemetry::metrics;
use tracing::info;

/// Database connection pool type
pub type PgPool = Pool<Postgres>;

/// Pooled connection supervisor for the relational store.
///
/// Every connection is pinged before it is handed out, so a connection that
/// died between messages is replaced transparently instead of failing the
/// next transaction.
#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresClient {
    /// Creates the pool with a single connection attempt.
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        metrics().connection_attempts.inc();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .test_before_acquire(true)
            .connect(&config.url)
            .await
            .map_err(|e| {
                metrics().connection_failures.inc();
                Error::transaction(format!(
                    "failed to connect to {}: {}",
                    dsn::redact(&config.url),
                    e
                ))
            })?;

        info!(
            url = %dsn::redact(&config.url),
            max_connections = config.max_connections,
            "Created PostgreSQL pool"
        );

        Ok(Self { pool, config })
    }

    /// Creates the pool under the bounded retry policy from `config`.
    pub async fn connect_with_retry(config: PostgresConfig) -> Result<Self> {
        let policy = config.retry_policy();
        supervisor::acquire(Dependency::RelationalStore, policy, || {
            Self::connect(config.clone())
        })
        .await
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
