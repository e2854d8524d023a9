//! Application configuration.

use anyhow::{Context, Result};
use postgres_client::PostgresConfig;
use rabbitmq::RabbitMqConfig;
use redis_cache::RedisConfig;
use serde::{Deserialize, Serialize};
use worker::PipelineConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rabbitmq: RabbitMqConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Seconds between metrics snapshot log lines
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,

    /// Create the lead tables at startup if they are missing
    #[serde(default)]
    pub init_schema: bool,
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rabbitmq: RabbitMqConfig::default(),
            postgres: PostgresConfig::default(),
            redis: RedisConfig::default(),
            pipeline: PipelineConfig::default(),
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
            init_schema: false,
        }
    }
}

/// Load configuration from files and environment.
pub fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("LEAD_WORKER")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_overrides(&mut config, |name| std::env::var(name).ok())?;

    Ok(config)
}

/// Applies the conventional connection variables shared with the lead API.
pub fn apply_overrides<F>(config: &mut Config, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("RABBITMQ_URL") {
        config.rabbitmq.url = url;
    }
    if let Some(url) = var("DATABASE_URL") {
        config.postgres.url = url;
    }
    if let Some(host) = var("REDIS_HOST") {
        config.redis.host = host;
    }
    if let Some(port) = var("REDIS_PORT") {
        config.redis.port = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid REDIS_PORT `{}`", port))?;
    }

    Ok(())
}
