//! Connection supervisor.
//!
//! Establishes connections to hard dependencies with a bounded number of
//! attempts and a fixed delay between them. Exhausting the bound yields
//! [`Error::Unavailable`], which callers treat as fatal.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// External system the worker depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
    QueueBroker,
    RelationalStore,
    Cache,
}

impl Dependency {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueueBroker => "RabbitMQ",
            Self::RelationalStore => "PostgreSQL",
            Self::Cache => "Redis",
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounded retry policy with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 20 attempts, 3s apart.
    pub const fn queue_default() -> Self {
        Self::new(20, Self::DEFAULT_DELAY)
    }

    /// 10 attempts, 3s apart.
    pub const fn store_default() -> Self {
        Self::new(10, Self::DEFAULT_DELAY)
    }
}

/// Acquires a connection, retrying up to `policy.max_attempts` times.
///
/// The delay is applied between attempts, never after the last one.
/// A zero `max_attempts` is treated as one attempt.
pub async fn acquire<T, E, F, Fut>(
    dependency: Dependency,
    policy: RetryPolicy,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        info!(
            dependency = %dependency,
            attempt = attempt,
            max_attempts = max_attempts,
            "Trying to connect to {} ({}/{})",
            dependency,
            attempt,
            max_attempts
        );

        match connect().await {
            Ok(connection) => {
                info!(dependency = %dependency, attempt = attempt, "Connected to {}", dependency);
                return Ok(connection);
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    dependency = %dependency,
                    attempt = attempt,
                    error = %last_error,
                    "{} not ready yet",
                    dependency
                );

                if attempt < max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(Error::unavailable(
        dependency.name(),
        max_attempts,
        last_error,
    ))
}
