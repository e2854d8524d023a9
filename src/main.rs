//! Lead Worker
//!
//! Durable background worker for lead events:
//! - `leads.enrich`: mark the lead processed and append an audit row in one
//!   PostgreSQL transaction, then invalidate the cached lead in Redis
//! - `leads.webhook`: log upstream status changes
//! - Acknowledgment after the pipeline completes, with graceful drain

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{load_config, Config};
use postgres_client::PostgresClient;
use rabbitmq::LapinConsumer;
use redis_cache::RedisCache;
use telemetry::{health, init_tracing_from_env};
use worker::{EnrichmentWorker, WebhookWorker, WorkerConfig, WorkerScheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Lead Worker v{}", env!("CARGO_PKG_VERSION"));

    let result = run().await;
    if let Err(ref e) = result {
        error!("Fatal: {:#}", e);
    }
    result
}

async fn run() -> Result<()> {
    let config = load_config()?;

    info!(
        enrich_queue = %config.rabbitmq.enrich.name,
        enrich_ack_mode = ?config.rabbitmq.enrich.ack_mode,
        enrich_max_attempts = config.rabbitmq.enrich.max_attempts,
        webhook_queue = %config.rabbitmq.webhook.name,
        webhook_ack_mode = ?config.rabbitmq.webhook.ack_mode,
        "Loaded configuration"
    );

    // Relational store (fatal if unreachable)
    let postgres = PostgresClient::connect_with_retry(config.postgres.clone())
        .await
        .context("PostgreSQL unavailable")?;

    if config.init_schema {
        postgres_client::schema::init_schema(&postgres)
            .await
            .context("Failed to initialize schema")?;
    }

    // Queue consumers (fatal if the broker is unreachable)
    let enrich_consumer =
        LapinConsumer::connect(config.rabbitmq.clone(), config.rabbitmq.enrich.spec())
            .await
            .context("RabbitMQ unavailable")?;
    let webhook_consumer =
        LapinConsumer::connect(config.rabbitmq.clone(), config.rabbitmq.webhook.spec())
            .await
            .context("RabbitMQ unavailable")?;

    // Cache connects lazily; startup does not wait for it
    let cache = Arc::new(RedisCache::new(config.redis.clone()));

    // Check health and update status
    check_health(&config, &postgres, &cache).await;

    let enrichment = Arc::new(EnrichmentWorker::with_config(
        Arc::new(postgres.clone()),
        cache.clone(),
        config.pipeline.clone(),
    ));
    let webhook = Arc::new(WebhookWorker::new());

    let mut scheduler = WorkerScheduler::new(WorkerConfig {
        metrics_log_interval: Duration::from_secs(config.metrics_log_interval_secs),
    });
    scheduler
        .add_consumer(Box::new(enrich_consumer), enrichment)
        .add_consumer(Box::new(webhook_consumer), webhook);
    scheduler.start();

    info!(status = ?health().report().status, "Lead worker running");

    let stopped = scheduler.shutdown_token();
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = stopped.cancelled() => {
            warn!("A consumer stopped; shutting down");
        }
    }

    // Cleanup
    info!("Shutting down...");

    let result = scheduler.shutdown().await;
    postgres.close().await;

    let summaries = result.context("Consumer failed")?;
    for summary in &summaries {
        info!(
            queue = %summary.queue,
            processed = summary.processed,
            acked = summary.acked,
            requeued = summary.requeued,
            nacked = summary.nacked,
            lost = summary.lost,
            "Queue drained"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

/// Check component health on startup.
async fn check_health(config: &Config, postgres: &PostgresClient, cache: &RedisCache) {
    // Check RabbitMQ
    if rabbitmq::health::check_connection(&config.rabbitmq).await {
        health().rabbitmq.set_healthy();
        info!("RabbitMQ connection: healthy");
    } else {
        health().rabbitmq.set_unhealthy("Connection failed");
        error!("RabbitMQ connection: unhealthy");
    }

    // Check PostgreSQL
    if postgres_client::health::check_connection(postgres).await {
        health().postgres.set_healthy();
        info!("PostgreSQL connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("PostgreSQL connection: unhealthy");
    }

    // Check Redis, bounded so a slow cache cannot hold up startup
    let check = redis_cache::health::check_connection(cache);
    let redis_healthy = tokio::time::timeout(config.pipeline.cache_timeout(), check)
        .await
        .unwrap_or(false);
    if redis_healthy {
        health().redis.set_healthy();
        info!("Redis connection: healthy");
    } else {
        health().redis.set_unhealthy("Connection failed");
        warn!("Redis connection: unhealthy; cache invalidation will retry per message");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
