//! RabbitMQ health checks.

use crate::config::RabbitMqConfig;
use crate::connection::open;
use tracing::{debug, error};

/// Check RabbitMQ connection health with a single connection attempt.
pub async fn check_connection(config: &RabbitMqConfig) -> bool {
    match open(config).await {
        Ok(connection) => {
            let connected = connection.status().connected();
            if let Err(e) = connection.close(200, "health check").await {
                debug!("Failed to close health check connection: {}", e);
            }
            debug!(connected = connected, "RabbitMQ connection checked");
            connected
        }
        Err(e) => {
            error!("RabbitMQ health check failed: {}", e);
            false
        }
    }
}
