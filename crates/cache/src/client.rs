//! Lazily connected Redis client.
//!
//! The cache is a soft dependency: startup never waits for it. The first
//! invalidation opens the connection, and a failed command drops it so the
//! next call reconnects.

use crate::config::RedisConfig;
use async_trait::async_trait;
use lead_core::{dsn, Error, LeadId, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Instant;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Removes stale cached lead records.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Deletes `lead:{id}`. Returns the number of keys removed; a missing key
    /// is not an error.
    async fn invalidate(&self, lead_id: LeadId) -> Result<u64>;
}

/// Redis-backed cache client.
pub struct RedisCache {
    config: RedisConfig,
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisCache {
    /// Creates the client without connecting.
    pub fn new(config: RedisConfig) -> Self {
        info!(url = %dsn::redact(&config.url()), "Created Redis cache client");
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Returns the shared connection, opening it on first use.
    pub(crate) async fn ensure_connected(&self) -> Result<ConnectionManager> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut slot = self.connection.write().await;
        if let Some(ref c) = *slot {
            return Ok(c.clone());
        }

        metrics().connection_attempts.inc();
        let url = self.config.url();
        let client = redis::Client::open(url.as_str()).map_err(|e| {
            metrics().connection_failures.inc();
            Error::cache(format!("invalid Redis url {}: {}", dsn::redact(&url), e))
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            metrics().connection_failures.inc();
            Error::cache(format!(
                "failed to connect to {}: {}",
                dsn::redact(&url),
                e
            ))
        })?;

        debug!(url = %dsn::redact(&url), "Connected to Redis");
        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// Drops the shared connection so the next call reconnects.
    pub(crate) async fn reset(&self) {
        *self.connection.write().await = None;
    }
}

#[async_trait]
impl CacheInvalidator for RedisCache {
    async fn invalidate(&self, lead_id: LeadId) -> Result<u64> {
        let start = Instant::now();
        let key = lead_id.cache_key();

        let mut conn = self.ensure_connected().await?;
        let result: redis::RedisResult<i64> = conn.del(&key).await;
        metrics()
            .cache_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(removed) => {
                debug!(key = %key, removed, "Invalidated cache key");
                Ok(removed.max(0) as u64)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache delete failed, dropping connection");
                self.reset().await;
                Err(Error::cache(format!("failed to delete {}: {}", key, e)))
            }
        }
    }
}
