//! Per-consumer count of failed attempts.
//!
//! The broker's `redelivered` flag is also set after a consumer crash, so it
//! cannot tell a retry from a first attempt. Failures are counted here by
//! message body instead, and the broker's own delivery counter wins when it
//! is higher.

use rabbitmq::Delivery;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Distinct failing messages remembered before the ledger starts over.
pub const DEFAULT_LEDGER_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct AttemptLedger {
    failures: HashMap<u64, u32>,
    capacity: usize,
}

impl Default for AttemptLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl AttemptLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            failures: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records a failed attempt and returns its 1-based attempt number.
    pub fn record_failure(&mut self, delivery: &Delivery) -> u32 {
        let key = key(&delivery.body);
        if self.failures.len() >= self.capacity && !self.failures.contains_key(&key) {
            // Starting over only grants extra retries
            self.failures.clear();
        }

        let seen = self.failures.entry(key).or_insert(0);
        *seen = seen.saturating_add(1);

        let counted_by_broker = delivery
            .delivery_count
            .map_or(0, |count| count.saturating_add(1));
        (*seen).max(counted_by_broker)
    }

    /// Drops the count once a message has been settled for good.
    pub fn forget(&mut self, delivery: &Delivery) {
        self.failures.remove(&key(&delivery.body));
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

fn key(body: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}
