//! PostgreSQL lead store for the lead worker.

pub mod client;
pub mod config;
pub mod enrich;
pub mod health;
pub mod query;
pub mod schema;

pub use client::*;
pub use config::*;
pub use enrich::{EnrichmentCommit, LeadStore};
pub use query::*;
