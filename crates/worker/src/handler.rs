//! Message handler seam and per-message outcomes.

use async_trait::async_trait;
use lead_core::{Error, ErrorKind};
use telemetry::metrics;
use tracing::warn;

/// Why a message was dropped without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Body is not a decodable JSON object.
    Malformed,
    /// Body decoded but carries no usable `lead_id`.
    EmptyKey,
}

/// Result of running one message through a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Lead updated, audit row written and cache key removed.
    Committed,
    /// Lead updated and audit row written; the cache may still hold stale data.
    CommittedCacheFailed,
    /// Nothing was written.
    TransactionFailed,
    /// No lead matched the id; nothing was written.
    NotFound,
    Discarded(DiscardReason),
    /// Message had no side effects beyond a log line.
    Logged,
}

impl Outcome {
    /// True when processing may succeed on redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::CommittedCacheFailed => "committed_cache_failed",
            Self::TransactionFailed => "transaction_failed",
            Self::NotFound => "not_found",
            Self::Discarded(DiscardReason::Malformed) => "discarded_malformed",
            Self::Discarded(DiscardReason::EmptyKey) => "discarded_empty_key",
            Self::Logged => "logged",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processes the body of one delivery.
///
/// Handlers never fail: every error is folded into an [`Outcome`] so the
/// consumer loop can decide how to acknowledge.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, body: &[u8]) -> Outcome;
}

/// Maps a decode failure to its discard outcome.
pub(crate) fn discard(queue: &str, err: &Error) -> Outcome {
    let reason = match err.kind() {
        ErrorKind::EmptyKey => {
            metrics().empty_key_messages.inc();
            DiscardReason::EmptyKey
        }
        _ => {
            metrics().malformed_messages.inc();
            DiscardReason::Malformed
        }
    };

    warn!(queue = %queue, code = err.kind().code(), error = %err, "Discarding message");
    Outcome::Discarded(reason)
}
