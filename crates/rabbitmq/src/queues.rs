//! Queue definitions.

use serde::{Deserialize, Serialize};

/// Queue names.
pub mod queue {
    pub const ENRICH: &str = "leads.enrich";
    pub const WEBHOOK: &str = "leads.webhook";
}

/// Deliveries of one message before a retryable failure is rejected.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// When a delivery counts as acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Broker acknowledges at receipt; a failure afterwards loses the message.
    Auto,
    /// Worker acknowledges after the handler completes.
    #[default]
    Manual,
}

impl AckMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// Queue declaration and consumption settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub ack_mode: AckMode,
    /// Attempts a retryable failure gets before it is rejected.
    pub max_attempts: u32,
    /// Exchange receiving rejected messages. Without one the broker drops them.
    pub dead_letter_exchange: Option<String>,
}

impl QueueSpec {
    /// Durable, manually acknowledged queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            ack_mode: AckMode::Manual,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dead_letter_exchange: None,
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    /// Clamped to at least one attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_dead_letter_exchange(mut self, exchange: Option<String>) -> Self {
        self.dead_letter_exchange = exchange.filter(|name| !name.is_empty());
        self
    }
}
