//! RabbitMQ consumer for lead queues.
//!
//! Uses lapin with:
//! - One connection and channel per consumed queue
//! - Durable queue declaration before consuming
//! - Per-queue acknowledgment mode (broker-side auto-ack or explicit ack/nack)
//! - Transparent reconnect, bounded by the connection supervisor

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions},
    types::{AMQPValue, FieldTable},
    Channel, Connection,
};
use lead_core::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RabbitMqConfig;
use crate::connection::{declare_queue, open_with_retry};
use crate::queues::{AckMode, QueueSpec, DEFAULT_MAX_ATTEMPTS};

/// Header quorum queues set to the number of earlier delivery attempts.
pub const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// A message received from a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub delivery_tag: u64,
    /// Set by the broker when this message was delivered before, including
    /// after a consumer crash.
    pub redelivered: bool,
    /// Earlier delivery attempts, when the broker counts them.
    pub delivery_count: Option<u32>,
    pub body: Vec<u8>,
}

/// Source of deliveries for a single queue.
///
/// Implemented by [`LapinConsumer`] in production and by in-memory mocks in
/// tests.
#[async_trait]
pub trait QueueConsumer: Send {
    /// Queue this consumer is bound to.
    fn queue(&self) -> &str;

    /// Acknowledgment mode the consumer was registered with.
    fn ack_mode(&self) -> AckMode;

    /// Attempts a retryable failure gets before it is rejected.
    fn max_attempts(&self) -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    /// Waits for the next delivery. `None` means the source is exhausted.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<()>;

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// lapin-backed consumer.
pub struct LapinConsumer {
    config: RabbitMqConfig,
    spec: QueueSpec,
    connection: Connection,
    channel: Channel,
    consumer: lapin::Consumer,
}

impl LapinConsumer {
    /// Connects (with bounded retry), declares the queue and starts consuming.
    pub async fn connect(config: RabbitMqConfig, spec: QueueSpec) -> Result<Self> {
        let (connection, channel, consumer) = Self::establish(&config, &spec).await?;

        info!(
            queue = %spec.name,
            ack_mode = ?spec.ack_mode,
            prefetch = config.prefetch,
            "Consumer bound to queue"
        );

        Ok(Self {
            config,
            spec,
            connection,
            channel,
            consumer,
        })
    }

    async fn establish(
        config: &RabbitMqConfig,
        spec: &QueueSpec,
    ) -> Result<(Connection, Channel, lapin::Consumer)> {
        let connection = open_with_retry(config).await?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::queue(format!("failed to open channel: {}", e)))?;

        // Prefetch only bounds unacknowledged deliveries
        if !spec.ack_mode.is_auto() {
            channel
                .basic_qos(config.prefetch, BasicQosOptions::default())
                .await
                .map_err(|e| {
                    Error::queue(format!(
                        "failed to configure prefetch (prefetch={}): {}",
                        config.prefetch, e
                    ))
                })?;
        }

        declare_queue(&channel, spec).await?;

        let options = BasicConsumeOptions {
            no_ack: spec.ack_mode.is_auto(),
            ..BasicConsumeOptions::default()
        };
        let consumer_tag = format!("lead-worker-{}-{}", spec.name, Uuid::new_v4());

        let consumer = channel
            .basic_consume(&spec.name, &consumer_tag, options, FieldTable::default())
            .await
            .map_err(|e| {
                Error::queue(format!(
                    "failed to start consumer on queue `{}`: {}",
                    spec.name, e
                ))
            })?;

        Ok((connection, channel, consumer))
    }

    async fn reconnect(&mut self) -> Result<()> {
        let (connection, channel, consumer) = Self::establish(&self.config, &self.spec).await?;

        self.connection = connection;
        self.channel = channel;
        self.consumer = consumer;

        info!(queue = %self.spec.name, "Consumer reconnected");
        Ok(())
    }

    fn convert_delivery(&self, delivery: lapin::message::Delivery) -> Delivery {
        Delivery {
            queue: self.spec.name.clone(),
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            delivery_count: delivery_count(delivery.properties.headers().as_ref()),
            body: delivery.data,
        }
    }
}

/// Reads the broker's delivery counter from message headers.
pub fn delivery_count(headers: Option<&FieldTable>) -> Option<u32> {
    let (_, value) = headers?
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)?;

    match value {
        AMQPValue::LongLongInt(n) => u32::try_from(*n).ok(),
        AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
        AMQPValue::LongUInt(n) => Some(*n),
        AMQPValue::ShortInt(n) => u32::try_from(*n).ok(),
        AMQPValue::ShortUInt(n) => Some(u32::from(*n)),
        _ => None,
    }
}

#[async_trait]
impl QueueConsumer for LapinConsumer {
    fn queue(&self) -> &str {
        &self.spec.name
    }

    fn ack_mode(&self) -> AckMode {
        self.spec.ack_mode
    }

    fn max_attempts(&self) -> u32 {
        self.spec.max_attempts
    }

    async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        loop {
            match self.consumer.next().await {
                Some(Ok(delivery)) => {
                    debug!(
                        queue = %self.spec.name,
                        delivery_tag = delivery.delivery_tag,
                        bytes = delivery.data.len(),
                        "Delivery received"
                    );
                    return Ok(Some(self.convert_delivery(delivery)));
                }
                Some(Err(e)) => {
                    warn!(queue = %self.spec.name, error = %e, "Consumer error; reconnecting");
                    self.reconnect().await?;
                }
                None => {
                    warn!(queue = %self.spec.name, "Consumer stream ended; reconnecting");
                    self.reconnect().await?;
                }
            }
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| Error::queue(format!("ack failed: {}", e)))
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let options = BasicNackOptions {
            requeue,
            ..BasicNackOptions::default()
        };

        self.channel
            .basic_nack(delivery_tag, options)
            .await
            .map_err(|e| Error::queue(format!("nack failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close(200, "worker shutdown").await {
            debug!(queue = %self.spec.name, error = %e, "Channel already closed");
        }
        self.connection
            .close(200, "worker shutdown")
            .await
            .map_err(|e| Error::queue(format!("failed to close connection: {}", e)))?;

        info!(queue = %self.spec.name, "Consumer closed");
        Ok(())
    }
}
