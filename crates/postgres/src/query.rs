//! Read helpers and fixtures for the lead tables.

use crate::client::PostgresClient;
use chrono::{DateTime, Utc};
use lead_core::{Error, LeadEventLogEntry, LeadId, Result};
use serde::Serialize;

/// Lead row as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LeadRow {
    pub id: i64,
    pub email: String,
    pub company: Option<String>,
    pub status: String,
}

#[derive(sqlx::FromRow)]
struct LeadEventRow {
    lead_id: i64,
    event_type: String,
    created_at: DateTime<Utc>,
}

/// Fetches a lead by id.
pub async fn fetch_lead(client: &PostgresClient, lead_id: LeadId) -> Result<Option<LeadRow>> {
    sqlx::query_as::<_, LeadRow>("SELECT id, email, company, status FROM leads WHERE id = $1")
        .bind(lead_id.get())
        .fetch_optional(client.pool())
        .await
        .map_err(|e| Error::transaction(format!("Failed to fetch lead: {}", e)))
}

/// Counts audit rows of one type for a lead.
pub async fn count_lead_events(
    client: &PostgresClient,
    lead_id: LeadId,
    event_type: &str,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lead_events WHERE lead_id = $1 AND event_type = $2",
    )
    .bind(lead_id.get())
    .bind(event_type)
    .fetch_one(client.pool())
    .await
    .map_err(|e| Error::transaction(format!("Failed to count lead events: {}", e)))
}

/// Audit trail for a lead, oldest first.
pub async fn lead_events(client: &PostgresClient, lead_id: LeadId) -> Result<Vec<LeadEventLogEntry>> {
    let rows = sqlx::query_as::<_, LeadEventRow>(
        "SELECT lead_id, event_type, created_at FROM lead_events WHERE lead_id = $1 ORDER BY id",
    )
    .bind(lead_id.get())
    .fetch_all(client.pool())
    .await
    .map_err(|e| Error::transaction(format!("Failed to query lead events: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            let lead_id = LeadId::new(row.lead_id)
                .ok_or_else(|| Error::internal(format!("invalid lead_id {}", row.lead_id)))?;
            Ok(LeadEventLogEntry {
                lead_id,
                event_type: row.event_type,
                created_at: row.created_at,
            })
        })
        .collect()
}

/// Inserts a new lead in status `new` and returns its id.
pub async fn insert_lead(client: &PostgresClient, email: &str) -> Result<LeadId> {
    let id = sqlx::query_scalar::<_, i64>("INSERT INTO leads (email) VALUES ($1) RETURNING id")
        .bind(email)
        .fetch_one(client.pool())
        .await
        .map_err(|e| Error::transaction(format!("Failed to insert lead: {}", e)))?;

    LeadId::new(id).ok_or_else(|| Error::internal(format!("invalid generated id {}", id)))
}
