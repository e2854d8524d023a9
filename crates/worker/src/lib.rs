//! Queue consumers and message handlers for the lead worker.
//!
//! - Enrichment (`leads.enrich` -> PostgreSQL transaction -> cache invalidation)
//! - Webhook (`leads.webhook` -> log)
//! - Acknowledgment state machine
//! - Consumer loops with graceful drain

pub mod ack;
pub mod attempts;
pub mod consumer;
pub mod enrichment;
pub mod handler;
pub mod scheduler;
pub mod webhook;

pub use ack::{AckController, AckDecision, DeliveryState, DeliveryTracker};
pub use attempts::AttemptLedger;
pub use consumer::*;
pub use enrichment::{EnrichmentWorker, PipelineConfig};
pub use handler::{DiscardReason, MessageHandler, Outcome};
pub use scheduler::*;
pub use webhook::WebhookWorker;
