//! Broker connection establishment.

use lapin::{
    options::QueueDeclareOptions,
    types::{AMQPValue, FieldTable},
    Channel, Connection, ConnectionProperties,
};
use lead_core::{dsn, supervisor, Dependency, Error, Result};
use telemetry::metrics;
use tokio_executor_trait::Tokio as TokioExecutor;
use tracing::debug;

use crate::config::RabbitMqConfig;
use crate::queues::QueueSpec;

/// Opens a single connection without retrying.
pub async fn open(config: &RabbitMqConfig) -> Result<Connection> {
    metrics().connection_attempts.inc();

    let properties = ConnectionProperties::default().with_executor(TokioExecutor::current());
    Connection::connect(&config.url, properties)
        .await
        .map_err(|e| {
            metrics().connection_failures.inc();
            Error::queue(format!(
                "failed to connect to {}: {}",
                dsn::redact(&config.url),
                e
            ))
        })
}

/// Opens a connection under the bounded retry policy from `config`.
pub async fn open_with_retry(config: &RabbitMqConfig) -> Result<Connection> {
    supervisor::acquire(Dependency::QueueBroker, config.retry_policy(), || open(config)).await
}

/// Declaration arguments for `spec`.
pub fn queue_arguments(spec: &QueueSpec) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(exchange) = &spec.dead_letter_exchange {
        arguments.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(exchange.as_str().into()),
        );
    }
    arguments
}

/// Declares a queue; idempotent when the queue already exists with the same
/// flags and arguments.
pub async fn declare_queue(channel: &Channel, spec: &QueueSpec) -> Result<()> {
    let options = QueueDeclareOptions {
        durable: spec.durable,
        ..QueueDeclareOptions::default()
    };

    let declared = channel
        .queue_declare(&spec.name, options, queue_arguments(spec))
        .await
        .map_err(|e| Error::queue(format!("failed to declare queue `{}`: {}", spec.name, e)))?;

    debug!(
        queue = %spec.name,
        durable = spec.durable,
        dead_letter_exchange = spec.dead_letter_exchange.as_deref().unwrap_or(""),
        messages = declared.message_count(),
        consumers = declared.consumer_count(),
        "Declared queue"
    );

    Ok(())
}
