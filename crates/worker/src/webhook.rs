//! Webhook notification handler.
//!
//! Webhook events only record that a lead's status changed upstream; the
//! handler logs and returns.

use async_trait::async_trait;
use lead_core::decode_webhook_event;
use telemetry::metrics;
use tracing::info;

use crate::handler::{discard, MessageHandler, Outcome};

const QUEUE: &str = "leads.webhook";

/// Handler for `leads.webhook`.
#[derive(Debug, Default)]
pub struct WebhookWorker;

impl WebhookWorker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for WebhookWorker {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn handle(&self, body: &[u8]) -> Outcome {
        let event = match decode_webhook_event(body) {
            Ok(event) => event,
            Err(e) => return discard(QUEUE, &e),
        };

        metrics().webhook_messages.inc();
        let status = event.status.as_deref().unwrap_or("<none>");
        info!(
            lead_id = %event.lead_id,
            status = %status,
            "Webhook updated lead {} to {}",
            event.lead_id,
            status
        );
        Outcome::Logged
    }
}
