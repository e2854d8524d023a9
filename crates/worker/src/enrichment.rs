//! Lead enrichment pipeline.
//!
//! decode -> transaction -> cache invalidation. The cache call only happens
//! after the transaction commits, and its failure never undoes the commit.

use async_trait::async_trait;
use lead_core::{decode_lead_event, Error, LeadEvent};
use postgres_client::LeadStore;
use redis_cache::CacheInvalidator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::handler::{discard, MessageHandler, Outcome};

const QUEUE: &str = "leads.enrich";

/// Per-call limits for the pipeline's external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: u64,
}

fn default_transaction_timeout_ms() -> u64 {
    5000
}

fn default_cache_timeout_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: default_transaction_timeout_ms(),
            cache_timeout_ms: default_cache_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

/// Handler for `leads.enrich`.
pub struct EnrichmentWorker {
    store: Arc<dyn LeadStore>,
    cache: Arc<dyn CacheInvalidator>,
    config: PipelineConfig,
}

impl EnrichmentWorker {
    pub fn new(store: Arc<dyn LeadStore>, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self::with_config(store, cache, PipelineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn LeadStore>,
        cache: Arc<dyn CacheInvalidator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs a decoded event through the transaction and cache steps.
    pub async fn process(&self, event: LeadEvent) -> Outcome {
        let lead_id = event.lead_id;
        let limit = self.config.transaction_timeout();

        let committed = match timeout(limit, self.store.apply_enrichment(lead_id)).await {
            Ok(Ok(commit)) => commit,
            Ok(Err(Error::NotFound(_))) => {
                metrics().leads_not_found.inc();
                warn!(lead_id = %lead_id, "Lead not found; nothing to enrich");
                return Outcome::NotFound;
            }
            Ok(Err(e)) => {
                metrics().transaction_errors.inc();
                error!(
                    lead_id = %lead_id,
                    code = e.kind().code(),
                    error = %e,
                    "Enrichment transaction failed"
                );
                return Outcome::TransactionFailed;
            }
            Err(_) => {
                let e = Error::timeout("enrichment transaction", limit);
                metrics().timeouts.inc();
                metrics().transaction_errors.inc();
                error!(lead_id = %lead_id, code = e.kind().code(), error = %e, "Enrichment transaction failed");
                return Outcome::TransactionFailed;
            }
        };

        metrics().leads_enriched.inc();
        info!(
            lead_id = %lead_id,
            rows_updated = committed.rows_updated,
            "Lead enriched"
        );

        let limit = self.config.cache_timeout();
        let start = Instant::now();
        match timeout(limit, self.cache.invalidate(lead_id)).await {
            Ok(Ok(removed)) => {
                metrics().cache_invalidations.inc();
                info!(
                    lead_id = %lead_id,
                    removed,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Cache invalidated"
                );
                Outcome::Committed
            }
            Ok(Err(e)) => {
                metrics().cache_errors.inc();
                warn!(
                    lead_id = %lead_id,
                    code = e.kind().code(),
                    error = %e,
                    "Cache invalidation failed; lead committed"
                );
                Outcome::CommittedCacheFailed
            }
            Err(_) => {
                let e = Error::timeout("cache invalidation", limit);
                metrics().timeouts.inc();
                metrics().cache_errors.inc();
                warn!(
                    lead_id = %lead_id,
                    code = e.kind().code(),
                    error = %e,
                    "Cache invalidation failed; lead committed"
                );
                Outcome::CommittedCacheFailed
            }
        }
    }
}

#[async_trait]
impl MessageHandler for EnrichmentWorker {
    fn name(&self) -> &'static str {
        "enrichment"
    }

    async fn handle(&self, body: &[u8]) -> Outcome {
        match decode_lead_event(body) {
            Ok(event) => self.process(event).await,
            Err(e) => discard(QUEUE, &e),
        }
    }
}
