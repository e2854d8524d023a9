//! Redis health checks.

use crate::client::RedisCache;
use tracing::{debug, error};

/// Check Redis connection health with a PING.
pub async fn check_connection(cache: &RedisCache) -> bool {
    let mut conn = match cache.ensure_connected().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Redis health check failed: {}", e);
            return false;
        }
    };

    let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(_) => {
            debug!("Redis connection healthy");
            true
        }
        Err(e) => {
            error!("Redis health check failed: {}", e);
            cache.reset().await;
            false
        }
    }
}
