//! Consumer loop for one queue.
//!
//! Messages are handled strictly one at a time:
//! 1. Wait for a delivery (the only point where shutdown is observed)
//! 2. Run the handler to an outcome
//! 3. Acknowledge according to the queue's ack mode
//! 4. Repeat
//!
//! An in-flight message therefore always finishes its pipeline and its
//! acknowledgment before the loop exits.

use lead_core::Result;
use rabbitmq::{Delivery, QueueConsumer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ack::{AckController, AckDecision, DeliveryState};
use crate::attempts::AttemptLedger;
use crate::handler::{MessageHandler, Outcome};

/// Per-queue totals reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerSummary {
    pub queue: String,
    pub processed: u64,
    pub acked: u64,
    pub requeued: u64,
    pub nacked: u64,
    pub lost: u64,
}

impl ConsumerSummary {
    fn record(&mut self, state: DeliveryState) {
        self.processed += 1;
        match state {
            DeliveryState::Acked => self.acked += 1,
            DeliveryState::Requeued => self.requeued += 1,
            DeliveryState::Nacked => self.nacked += 1,
            DeliveryState::Lost => self.lost += 1,
            DeliveryState::Received | DeliveryState::Processing => {}
        }
    }
}

/// Worker that feeds one queue into one handler.
pub struct ConsumerWorker {
    consumer: Box<dyn QueueConsumer>,
    handler: Arc<dyn MessageHandler>,
    controller: AckController,
    attempts: AttemptLedger,
    shutdown: CancellationToken,
}

impl ConsumerWorker {
    pub fn new(
        consumer: Box<dyn QueueConsumer>,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        let controller =
            AckController::new(consumer.ack_mode()).with_max_attempts(consumer.max_attempts());
        Self {
            consumer,
            handler,
            controller,
            attempts: AttemptLedger::default(),
            shutdown,
        }
    }

    pub fn queue(&self) -> &str {
        self.consumer.queue()
    }

    /// Main run loop. Returns when shutdown is requested or the source is
    /// exhausted; returns an error only when the broker cannot be reached.
    pub async fn run(mut self) -> Result<ConsumerSummary> {
        let mut summary = ConsumerSummary {
            queue: self.consumer.queue().to_string(),
            ..ConsumerSummary::default()
        };

        info!(
            queue = %summary.queue,
            handler = self.handler.name(),
            ack_mode = ?self.controller.mode(),
            max_attempts = self.controller.max_attempts(),
            "Consumer worker starting"
        );

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(queue = %summary.queue, "Shutdown requested; consumer draining");
                    break Ok(());
                }
                next = self.consumer.next_delivery() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    info!(queue = %summary.queue, "Delivery source exhausted");
                    break Ok(());
                }
                Err(e) => {
                    error!(queue = %summary.queue, error = %e, "Consumer lost its broker connection");
                    break Err(e);
                }
            };

            match self.process(delivery).await {
                Ok(state) => summary.record(state),
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.consumer.close().await {
            warn!(queue = %summary.queue, error = %e, "Failed to close consumer");
        }

        info!(
            queue = %summary.queue,
            processed = summary.processed,
            acked = summary.acked,
            requeued = summary.requeued,
            nacked = summary.nacked,
            lost = summary.lost,
            "Consumer worker stopped"
        );

        result.map(|_| summary)
    }

    /// Runs one delivery to a terminal state.
    async fn process(&mut self, delivery: Delivery) -> Result<DeliveryState> {
        metrics().messages_received.inc();
        metrics().in_flight.inc();

        let mut tracker = self.controller.tracker();
        tracker.begin()?;

        debug!(
            queue = %delivery.queue,
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            delivery_count = ?delivery.delivery_count,
            "Processing delivery"
        );

        let start = Instant::now();
        let outcome = self.handler.handle(&delivery.body).await;
        metrics()
            .pipeline_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let attempt = self.attempt_number(&delivery, &outcome);
        let decision = self.controller.decide(&outcome, attempt);
        if decision == (AckDecision::Nack { requeue: false }) {
            self.attempts.forget(&delivery);
        }
        let sent = match decision {
            AckDecision::Ack => self.consumer.ack(delivery.delivery_tag).await,
            AckDecision::Nack { requeue } => {
                self.consumer.nack(delivery.delivery_tag, requeue).await
            }
            AckDecision::AlreadyAcked => Ok(()),
        };

        let state = match sent {
            Ok(()) => tracker.settle(decision, &outcome),
            Err(e) => {
                metrics().ack_errors.inc();
                warn!(
                    queue = %delivery.queue,
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Acknowledgment failed; broker will redeliver"
                );
                tracker.settle_failed()
            }
        };
        metrics().in_flight.dec();
        let state = state?;

        match state {
            DeliveryState::Acked => metrics().messages_acked.inc(),
            DeliveryState::Requeued => metrics().messages_requeued.inc(),
            DeliveryState::Nacked => metrics().messages_nacked.inc(),
            DeliveryState::Lost => {
                metrics().messages_lost.inc();
                error!(
                    queue = %delivery.queue,
                    delivery_tag = delivery.delivery_tag,
                    outcome = %outcome,
                    "Message lost: auto-acknowledged before a failed pipeline"
                );
            }
            DeliveryState::Received | DeliveryState::Processing => {}
        }

        info!(
            queue = %delivery.queue,
            delivery_tag = delivery.delivery_tag,
            outcome = %outcome,
            attempt,
            decision = ?decision,
            state = ?state,
            "Delivery settled"
        );

        Ok(state)
    }

    /// 1-based attempt number for this delivery's outcome.
    fn attempt_number(&mut self, delivery: &Delivery, outcome: &Outcome) -> u32 {
        if self.controller.mode().is_auto() {
            return 1;
        }
        if outcome.is_retryable() {
            self.attempts.record_failure(delivery)
        } else {
            self.attempts.forget(delivery);
            1
        }
    }
}
