//! Table definitions.
//!
//! The `leads` and `lead_events` tables are owned by the lead API; these DDL
//! statements mirror the columns the worker relies on and are used to
//! bootstrap test and local databases.

use crate::client::PostgresClient;
use lead_core::{Error, Result};
use tracing::debug;

pub const LEADS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leads (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    name TEXT,
    source TEXT,
    company TEXT,
    status TEXT NOT NULL DEFAULT 'new',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const LEAD_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lead_events (
    id BIGSERIAL PRIMARY KEY,
    lead_id BIGINT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    payload JSONB,
    event TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const LEAD_EVENTS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_lead_events_lead_id ON lead_events (lead_id)";

/// All DDL statements in dependency order.
pub fn all_tables() -> Vec<&'static str> {
    vec![LEADS_TABLE, LEAD_EVENTS_TABLE, LEAD_EVENTS_INDEX]
}

/// Creates any missing tables.
pub async fn init_schema(client: &PostgresClient) -> Result<()> {
    for ddl in all_tables() {
        sqlx::query(ddl)
            .execute(client.pool())
            .await
            .map_err(|e| Error::internal(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!("PostgreSQL schema initialized");
    Ok(())
}
