//! Redis cache invalidation for the lead worker.

pub mod client;
pub mod config;
pub mod health;

pub use client::{CacheInvalidator, RedisCache};
pub use config::RedisConfig;
