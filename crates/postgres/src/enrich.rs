//! Enrichment transaction.
//!
//! The lead update and its audit row are written in one transaction: either
//! both commit or neither does. The transaction is owned by this function, so
//! every early return drops it, and sqlx rolls back a dropped transaction
//! before the connection goes back to the pool.

use async_trait::async_trait;
use lead_core::{Error, LeadId, Result, ENRICHED_COMPANY, LEAD_PROCESSED_EVENT, PROCESSED_STATUS};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::client::PostgresClient;

pub const UPDATE_LEAD_SQL: &str = "UPDATE leads SET company = $1, status = $2 WHERE id = $3";

pub const INSERT_LEAD_EVENT_SQL: &str =
    "INSERT INTO lead_events (lead_id, event_type) VALUES ($1, $2)";

/// Result of a committed enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentCommit {
    pub lead_id: LeadId,
    pub rows_updated: u64,
}

/// Store that applies the enrichment mutation.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Marks the lead processed and appends a `lead_processed` audit row,
    /// atomically.
    ///
    /// Returns [`Error::NotFound`] (after rolling back) when no lead matches,
    /// and [`Error::Transaction`] for any store failure.
    async fn apply_enrichment(&self, lead_id: LeadId) -> Result<EnrichmentCommit>;
}

#[async_trait]
impl LeadStore for PostgresClient {
    async fn apply_enrichment(&self, lead_id: LeadId) -> Result<EnrichmentCommit> {
        let start = Instant::now();
        let result = apply_enrichment_tx(self, lead_id).await;
        metrics()
            .transaction_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        result
    }
}

async fn apply_enrichment_tx(client: &PostgresClient, lead_id: LeadId) -> Result<EnrichmentCommit> {
    let mut tx = client
        .pool()
        .begin()
        .await
        .map_err(|e| Error::transaction(format!("failed to begin transaction: {}", e)))?;

    let updated = sqlx::query(UPDATE_LEAD_SQL)
        .bind(ENRICHED_COMPANY)
        .bind(PROCESSED_STATUS)
        .bind(lead_id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::transaction(format!("failed to update lead {}: {}", lead_id, e)))?;

    if updated.rows_affected() == 0 {
        tx.rollback()
            .await
            .map_err(|e| Error::transaction(format!("failed to roll back: {}", e)))?;
        warn!(lead_id = %lead_id, "No lead row matched; rolled back");
        return Err(Error::NotFound(lead_id));
    }

    sqlx::query(INSERT_LEAD_EVENT_SQL)
        .bind(lead_id.get())
        .bind(LEAD_PROCESSED_EVENT)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::transaction(format!(
                "failed to insert audit event for lead {}: {}",
                lead_id, e
            ))
        })?;

    tx.commit()
        .await
        .map_err(|e| Error::transaction(format!("failed to commit lead {}: {}", lead_id, e)))?;

    debug!(
        lead_id = %lead_id,
        rows_updated = updated.rows_affected(),
        "Enrichment transaction committed"
    );

    Ok(EnrichmentCommit {
        lead_id,
        rows_updated: updated.rows_affected(),
    })
}
