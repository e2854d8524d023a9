//! Worker scheduler: one consumer task per queue plus a metrics reporter.

use lead_core::{Error, Result};
use rabbitmq::QueueConsumer;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::consumer::{ConsumerSummary, ConsumerWorker};
use crate::handler::MessageHandler;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Metrics snapshot log interval
    pub metrics_log_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

/// Runs the consumer loops and owns their shutdown token.
pub struct WorkerScheduler {
    config: WorkerConfig,
    shutdown: CancellationToken,
    pending: Vec<ConsumerWorker>,
    consumers: Vec<JoinHandle<Result<ConsumerSummary>>>,
    reporter: Option<JoinHandle<()>>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            pending: Vec::new(),
            consumers: Vec::new(),
            reporter: None,
        }
    }

    /// Token cancelled on shutdown, or when any consumer stops on its own.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registers a queue consumer and the handler for its messages.
    pub fn add_consumer(
        &mut self,
        consumer: Box<dyn QueueConsumer>,
        handler: Arc<dyn MessageHandler>,
    ) -> &mut Self {
        self.pending
            .push(ConsumerWorker::new(consumer, handler, self.shutdown.child_token()));
        self
    }

    /// Spawns all registered consumers and the metrics reporter.
    pub fn start(&mut self) {
        for worker in self.pending.drain(..) {
            let queue = worker.queue().to_string();
            let shutdown = self.shutdown.clone();
            self.consumers.push(tokio::spawn(async move {
                let result = worker.run().await;
                if let Err(ref e) = result {
                    error!(queue = %queue, error = %e, "Consumer worker fatal error");
                }
                // One queue stopping stops the process
                shutdown.cancel();
                result
            }));
        }

        let interval = self.config.metrics_log_interval;
        let shutdown = self.shutdown.clone();
        self.reporter = Some(tokio::spawn(async move {
            run_metrics_reporter(interval, shutdown).await;
        }));

        info!(consumers = self.consumers.len(), "Background workers started");
    }

    /// Cancels the consumers, waits for in-flight messages to settle and
    /// returns each queue's summary. Fails if any consumer stopped with an
    /// error.
    pub async fn shutdown(mut self) -> Result<Vec<ConsumerSummary>> {
        self.shutdown.cancel();

        let mut summaries = Vec::with_capacity(self.consumers.len());
        let mut first_error = None;

        for handle in self.consumers.drain(..) {
            match handle.await {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(Error::internal(format!(
                        "consumer task panicked: {}",
                        e
                    )));
                }
            }
        }

        if let Some(reporter) = self.reporter.take() {
            let _ = reporter.await;
        }

        info!("Background workers stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(summaries),
        }
    }
}

async fn run_metrics_reporter(period: Duration, shutdown: CancellationToken) {
    let mut ticker = interval(period);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => log_snapshot(),
        }
    }

    log_snapshot();
}

fn log_snapshot() {
    let s = metrics().snapshot();
    info!(
        received = s.messages_received,
        acked = s.messages_acked,
        requeued = s.messages_requeued,
        nacked = s.messages_nacked,
        lost = s.messages_lost,
        ack_errors = s.ack_errors,
        malformed = s.malformed_messages,
        empty_key = s.empty_key_messages,
        enriched = s.leads_enriched,
        not_found = s.leads_not_found,
        transaction_errors = s.transaction_errors,
        timeouts = s.timeouts,
        cache_invalidations = s.cache_invalidations,
        cache_errors = s.cache_errors,
        webhook = s.webhook_messages,
        connection_attempts = s.connection_attempts,
        connection_failures = s.connection_failures,
        transaction_latency_mean_ms = s.transaction_latency_mean_ms,
        cache_latency_mean_ms = s.cache_latency_mean_ms,
        cache_latency_p99_ms = s.cache_latency_p99_ms,
        pipeline_latency_mean_ms = s.pipeline_latency_mean_ms,
        pipeline_latency_p99_ms = s.pipeline_latency_p99_ms,
        in_flight = s.in_flight,
        "Metrics snapshot"
    );
}
