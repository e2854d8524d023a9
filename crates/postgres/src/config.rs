//! PostgreSQL configuration.

use lead_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PostgreSQL pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Seconds an idle connection is kept
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Connection attempts at startup before giving up
    #[serde(default = "default_connect_max_attempts")]
    pub connect_max_attempts: u32,
    /// Delay between connection attempts in milliseconds
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_connect_max_attempts() -> u32 {
    RetryPolicy::store_default().max_attempts
}

fn default_connect_retry_delay_ms() -> u64 {
    RetryPolicy::store_default().delay.as_millis() as u64
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://user:password@db:5432/leadsdb".to_string(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_max_attempts: default_connect_max_attempts(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
        }
    }
}

impl PostgresConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_max_attempts,
            Duration::from_millis(self.connect_retry_delay_ms),
        )
    }
}
