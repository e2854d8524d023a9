//! RabbitMQ consumer plumbing for the lead worker.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod health;
pub mod queues;

pub use config::*;
pub use consumer::*;
pub use queues::*;
