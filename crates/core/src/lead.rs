//! Lead domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder company written by the enrichment step.
pub const ENRICHED_COMPANY: &str = "Unknown";

/// Status a lead carries once enriched.
pub const PROCESSED_STATUS: &str = "processed";

/// Audit event type recorded for every enrichment.
pub const LEAD_PROCESSED_EVENT: &str = "lead_processed";

/// Cache key prefix shared with the API's read-through cache.
pub const CACHE_KEY_PREFIX: &str = "lead:";

/// Primary key of a row in the `leads` table.
///
/// Always positive; zero is treated as "no identifier" by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(i64);

impl LeadId {
    /// Returns `None` for non-positive values.
    pub fn new(id: i64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Cache key holding this lead's cached representation.
    pub fn cache_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.0)
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event consumed from `leads.enrich`.
///
/// Lives for a single processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadEvent {
    pub lead_id: LeadId,
    /// Additional publisher fields (`status` included), carried but ignored.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Event consumed from `leads.webhook`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub lead_id: LeadId,
    pub status: Option<String>,
}

/// Append-only audit record in `lead_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadEventLogEntry {
    pub lead_id: LeadId,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
}
