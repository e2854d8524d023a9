//! Common test setup functions.

use postgres_client::{schema::init_schema, PostgresClient, PostgresConfig};
use redis_cache::{RedisCache, RedisConfig};
use std::sync::Arc;
use std::time::Duration;
use worker::{EnrichmentWorker, PipelineConfig};

use crate::containers::TestContainers;

/// Test context with real PostgreSQL and Redis.
///
/// Tests share the database when external URLs are configured, so each test
/// inserts its own leads instead of truncating.
pub struct TestContext {
    pub containers: TestContainers,
    pub postgres: PostgresClient,
    pub cache: Arc<RedisCache>,
}

impl TestContext {
    /// Create a new test context with the schema initialized.
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;

        let pg_config = PostgresConfig {
            url: containers.database_url.clone(),
            connect_max_attempts: 20,
            connect_retry_delay_ms: 500,
            ..PostgresConfig::default()
        };
        let postgres = PostgresClient::connect_with_retry(pg_config)
            .await
            .expect("Failed to connect to PostgreSQL");

        init_schema(&postgres)
            .await
            .expect("Failed to initialize schema");

        let cache = Arc::new(RedisCache::new(RedisConfig::new(
            containers.redis_host.clone(),
            containers.redis_port,
        )));

        Self {
            containers,
            postgres,
            cache,
        }
    }

    /// Enrichment worker wired to the real stores.
    pub fn enrichment_worker(&self) -> EnrichmentWorker {
        EnrichmentWorker::with_config(
            Arc::new(self.postgres.clone()),
            self.cache.clone(),
            PipelineConfig::default(),
        )
    }

    /// Raw Redis connection for seeding and inspecting keys.
    pub async fn redis_connection(&self) -> redis::aio::MultiplexedConnection {
        let url = self.cache.config().url();
        let client = redis::Client::open(url.as_str()).expect("Invalid Redis url");
        client
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis")
    }
}

/// Pipeline config with short limits for timeout tests.
pub fn short_timeouts() -> PipelineConfig {
    PipelineConfig {
        transaction_timeout_ms: 50,
        cache_timeout_ms: 50,
    }
}

/// Polling helper for asynchronous assertions.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
