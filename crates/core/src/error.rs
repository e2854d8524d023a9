//! Unified error types for the lead worker.
//!
//! Every failure is classified by an [`ErrorKind`] so the acknowledgment
//! controller and the metrics layer can tell them apart:
//! - UNAVAILABLE: dependency unreachable after bounded retries (fatal)
//! - MALFORMED / EMPTY_KEY: message can never succeed, discarded
//! - TRANSACTION / NOT_FOUND / TIMEOUT: relational store outcomes
//! - CACHE: invalidation failed after a successful commit

use thiserror::Error;

use crate::lead::LeadId;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unavailable,
    Malformed,
    EmptyKey,
    Transaction,
    NotFound,
    Cache,
    Timeout,
    Queue,
    Internal,
}

impl ErrorKind {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::Malformed => "MALFORMED",
            Self::EmptyKey => "EMPTY_KEY",
            Self::Transaction => "TRANSACTION",
            Self::NotFound => "NOT_FOUND",
            Self::Cache => "CACHE",
            Self::Timeout => "TIMEOUT",
            Self::Queue => "QUEUE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether the process cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified error type for the lead worker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[UNAVAILABLE] {dependency} unreachable after {attempts} attempts: {message}")]
    Unavailable {
        dependency: String,
        attempts: u32,
        message: String,
    },

    #[error("[MALFORMED] {0}")]
    Malformed(String),

    #[error("[EMPTY_KEY] message has no lead_id")]
    EmptyKey,

    #[error("[TRANSACTION] {0}")]
    Transaction(String),

    #[error("[NOT_FOUND] lead {0} does not exist")]
    NotFound(LeadId),

    #[error("[CACHE] {0}")]
    Cache(String),

    #[error("[TIMEOUT] {operation} exceeded {limit_ms}ms")]
    Timeout {
        operation: &'static str,
        limit_ms: u64,
    },

    #[error("[QUEUE] {0}")]
    Queue(String),

    #[error("[INTERNAL] {0}")]
    Internal(String),
}

impl Error {
    pub fn unavailable(
        dependency: impl Into<String>,
        attempts: u32,
        msg: impl Into<String>,
    ) -> Self {
        Self::Unavailable {
            dependency: dependency.into(),
            attempts,
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn timeout(operation: &'static str, limit: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            limit_ms: limit.as_millis() as u64,
        }
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::EmptyKey => ErrorKind::EmptyKey,
            Self::Transaction(_) => ErrorKind::Transaction,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Queue(_) => ErrorKind::Queue,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
