//! Consumer loop tests against in-memory queue, store and cache.
//!
//! Every test drives the real `ConsumerWorker`, `EnrichmentWorker` and
//! acknowledgment controller; only the broker, PostgreSQL and Redis are
//! replaced by the mocks in `integration_tests::mocks`.

use integration_tests::fixtures;
use integration_tests::mocks::{MockCache, MockConsumer, MockLeadStore, Settlement};
use integration_tests::setup::short_timeouts;
use lead_core::ErrorKind;
use rabbitmq::{queue, AckMode, DEFAULT_MAX_ATTEMPTS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use worker::{ConsumerSummary, ConsumerWorker, EnrichmentWorker, MessageHandler, Outcome};

struct Harness {
    consumer: MockConsumer,
    store: MockLeadStore,
    cache: MockCache,
    worker: Arc<EnrichmentWorker>,
}

impl Harness {
    fn new(ack_mode: AckMode, leads: &[i64]) -> Self {
        Self::with_config(ack_mode, leads, worker::PipelineConfig::default())
    }

    fn with_config(ack_mode: AckMode, leads: &[i64], config: worker::PipelineConfig) -> Self {
        let store = MockLeadStore::with_leads(leads);
        let cache = MockCache::new();
        let worker = Arc::new(EnrichmentWorker::with_config(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            config,
        ));

        Self {
            consumer: MockConsumer::new(queue::ENRICH, ack_mode),
            store,
            cache,
            worker,
        }
    }

    /// Runs the loop until the mock queue is empty.
    async fn drain(&self) -> ConsumerSummary {
        ConsumerWorker::new(
            Box::new(self.consumer.clone()),
            self.worker.clone(),
            CancellationToken::new(),
        )
        .run()
        .await
        .expect("consumer loop failed")
    }
}

#[tokio::test]
async fn test_enrich_commits_invalidates_and_acks() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.cache.insert(42);
    let tag = h.consumer.push(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert_eq!(h.store.commit_count(42), 1);
    assert!(!h.cache.contains("lead:42"));
    assert_eq!(h.consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.acked, 1);
    assert!(h.consumer.is_closed());
}

#[tokio::test]
async fn test_string_lead_id_is_accepted() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let outcome = h.worker.handle(br#"{"lead_id": "42"}"#).await;

    assert_eq!(outcome, Outcome::Committed);
    assert_eq!(h.store.commit_count(42), 1);
}

#[tokio::test]
async fn test_non_string_status_is_ignored_on_enrich() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let numeric = h.consumer.push(br#"{"lead_id": 42, "status": 5}"#.to_vec());
    let nested = h
        .consumer
        .push(br#"{"lead_id": 42, "status": {"stage": "new"}}"#.to_vec());

    let outcome = h.worker.handle(br#"{"lead_id": 42, "status": 5}"#).await;
    assert_eq!(outcome, Outcome::Committed);

    let summary = h.drain().await;

    assert_eq!(h.store.commit_count(42), 3);
    assert_eq!(
        h.consumer.settlements(),
        vec![Settlement::Ack(numeric), Settlement::Ack(nested)]
    );
    assert_eq!(summary.acked, 2);
}

#[tokio::test]
async fn test_empty_event_is_acked_without_side_effects() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let tag = h.consumer.push(fixtures::empty_payload());

    let summary = h.drain().await;

    assert_eq!(h.store.calls(), 0);
    assert!(h.cache.invalidated().is_empty());
    assert_eq!(h.consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.acked, 1);
}

#[tokio::test]
async fn test_malformed_payload_is_acked_without_side_effects() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let malformed = h.consumer.push(fixtures::malformed_payload());
    let not_object = h.consumer.push(b"[42]".to_vec());

    let summary = h.drain().await;

    assert_eq!(h.store.calls(), 0);
    assert!(h.cache.invalidated().is_empty());
    assert_eq!(
        h.consumer.settlements(),
        vec![Settlement::Ack(malformed), Settlement::Ack(not_object)]
    );
    assert_eq!(summary.acked, 2);
}

#[tokio::test]
async fn test_cache_failure_keeps_commit_and_acks() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.cache.insert(42);
    h.cache.set_should_fail(true);
    let tag = h.consumer.push(fixtures::enrich_payload(42));

    let outcome = h.worker.handle(&fixtures::enrich_payload(42)).await;
    assert_eq!(outcome, Outcome::CommittedCacheFailed);

    let summary = h.drain().await;

    assert_eq!(h.store.commit_count(42), 2);
    assert!(h.cache.contains("lead:42"));
    assert_eq!(h.consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.acked, 1);
}

#[tokio::test]
async fn test_cache_not_called_when_transaction_fails() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.store.set_should_fail(true);

    let outcome = h.worker.handle(&fixtures::enrich_payload(42)).await;

    assert_eq!(outcome, Outcome::TransactionFailed);
    assert!(h.cache.invalidated().is_empty());
}

#[tokio::test]
async fn test_transaction_failure_requeues_until_attempts_exhausted() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.store.set_should_fail(true);
    let tag = h.consumer.push(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert_eq!(
        h.consumer.settlements(),
        vec![
            Settlement::Nack {
                delivery_tag: tag,
                requeue: true
            },
            Settlement::Nack {
                delivery_tag: tag + 1,
                requeue: true
            },
            Settlement::Nack {
                delivery_tag: tag + 2,
                requeue: false
            },
        ]
    );
    assert_eq!(h.store.calls(), DEFAULT_MAX_ATTEMPTS as usize);
    assert_eq!(h.store.commit_count(42), 0);
    assert_eq!(summary.requeued, 2);
    assert_eq!(summary.nacked, 1);
    assert_eq!(h.consumer.pending(), 0);
}

#[tokio::test]
async fn test_redelivery_after_recovery_commits() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let tag = h.consumer.push_redelivered(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert_eq!(h.consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.acked, 1);
}

#[tokio::test]
async fn test_crash_redelivered_message_survives_transient_failure() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.store.fail_next(1);
    let tag = h.consumer.push_redelivered(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert_eq!(
        h.consumer.settlements(),
        vec![
            Settlement::Nack {
                delivery_tag: tag,
                requeue: true
            },
            Settlement::Ack(tag + 1),
        ]
    );
    assert_eq!(h.store.calls(), 2);
    assert_eq!(h.store.commit_count(42), 1);
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.acked, 1);
    assert_eq!(summary.nacked, 0);
}

#[tokio::test]
async fn test_crash_redelivered_failure_is_not_rejected_on_first_attempt() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.store.set_should_fail(true);
    let tag = h.consumer.push_redelivered(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    let settlements = h.consumer.settlements();
    assert_eq!(
        settlements[0],
        Settlement::Nack {
            delivery_tag: tag,
            requeue: true
        }
    );
    assert_eq!(h.store.calls(), DEFAULT_MAX_ATTEMPTS as usize);
    assert_eq!(summary.nacked, 1);
}

#[tokio::test]
async fn test_broker_delivery_count_bounds_attempts() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.store.set_should_fail(true);
    // Two earlier deliveries were already spent elsewhere
    let tag = h
        .consumer
        .push_counted(fixtures::enrich_payload(42), DEFAULT_MAX_ATTEMPTS - 1);

    let summary = h.drain().await;

    assert_eq!(
        h.consumer.settlements(),
        vec![Settlement::Nack {
            delivery_tag: tag,
            requeue: false
        }]
    );
    assert_eq!(h.store.calls(), 1);
    assert_eq!(summary.nacked, 1);
}

#[tokio::test]
async fn test_broker_loss_stops_consumer_with_error() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.consumer.push(fixtures::enrich_payload(42));
    h.consumer.set_broker_lost(true);

    let err = ConsumerWorker::new(
        Box::new(h.consumer.clone()),
        h.worker.clone(),
        CancellationToken::new(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.is_fatal());
    assert!(h.consumer.is_closed());
    assert_eq!(h.store.calls(), 0);
    assert!(h.consumer.settlements().is_empty());
}

#[tokio::test]
async fn test_auto_ack_failure_is_lost() {
    let h = Harness::new(AckMode::Auto, &[42]);
    h.store.set_should_fail(true);
    h.consumer.push(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert!(h.consumer.settlements().is_empty());
    assert_eq!(summary.lost, 1);
    assert_eq!(summary.acked, 0);
    assert_eq!(h.consumer.pending(), 0);
}

#[tokio::test]
async fn test_auto_ack_success_sends_nothing() {
    let h = Harness::new(AckMode::Auto, &[42]);
    h.consumer.push(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert!(h.consumer.settlements().is_empty());
    assert_eq!(summary.acked, 1);
    assert_eq!(h.store.commit_count(42), 1);
}

#[tokio::test]
async fn test_unknown_lead_is_acked_without_cache_call() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let tag = h.consumer.push(fixtures::enrich_payload(404));

    let outcome = h.worker.handle(&fixtures::enrich_payload(404)).await;
    assert_eq!(outcome, Outcome::NotFound);

    let summary = h.drain().await;

    assert!(h.store.commits().is_empty());
    assert!(h.cache.invalidated().is_empty());
    assert_eq!(h.consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.acked, 1);
}

#[tokio::test]
async fn test_transaction_timeout_is_retryable() {
    let h = Harness::with_config(AckMode::Manual, &[42], short_timeouts());
    h.store.set_delay(Duration::from_millis(500));

    let outcome = h.worker.handle(&fixtures::enrich_payload(42)).await;

    assert_eq!(outcome, Outcome::TransactionFailed);
    assert!(h.store.commits().is_empty());
    assert!(h.cache.invalidated().is_empty());
}

#[tokio::test]
async fn test_cache_timeout_keeps_commit() {
    let h = Harness::with_config(AckMode::Manual, &[42], short_timeouts());
    h.cache.insert(42);
    h.cache.set_delay(Duration::from_millis(500));

    let outcome = h.worker.handle(&fixtures::enrich_payload(42)).await;

    assert_eq!(outcome, Outcome::CommittedCacheFailed);
    assert_eq!(h.store.commit_count(42), 1);
}

#[tokio::test]
async fn test_ack_failure_counts_as_requeued() {
    let h = Harness::new(AckMode::Manual, &[42]);
    h.consumer.set_fail_acks(true);
    h.consumer.push(fixtures::enrich_payload(42));

    let summary = h.drain().await;

    assert_eq!(h.store.commit_count(42), 1);
    assert!(h.consumer.settlements().is_empty());
    assert_eq!(summary.requeued, 1);
}

#[tokio::test]
async fn test_messages_processed_in_order() {
    let h = Harness::new(AckMode::Manual, &[1, 2, 3]);
    let tags: Vec<u64> = [1, 2, 3]
        .iter()
        .map(|id| h.consumer.push(fixtures::enrich_payload(*id)))
        .collect();

    h.drain().await;

    let ids: Vec<i64> = h.store.commits().iter().map(|id| id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(
        h.consumer.settlements(),
        tags.into_iter().map(Settlement::Ack).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_shutdown_finishes_in_flight_message() {
    let h = Harness::new(AckMode::Manual, &[42]);
    let consumer = h.consumer.clone().held_open();
    h.store.set_delay(Duration::from_millis(200));
    let tag = consumer.push(fixtures::enrich_payload(42));

    let shutdown = CancellationToken::new();
    let loop_handle = tokio::spawn(
        ConsumerWorker::new(Box::new(consumer.clone()), h.worker.clone(), shutdown.clone()).run(),
    );

    // Cancel while the transaction is running
    h.store.started().await;
    shutdown.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), loop_handle)
        .await
        .expect("consumer did not drain")
        .unwrap()
        .unwrap();

    assert_eq!(h.store.commit_count(42), 1);
    assert_eq!(consumer.settlements(), vec![Settlement::Ack(tag)]);
    assert_eq!(summary.processed, 1);
    assert!(consumer.is_closed());
}

#[tokio::test]
async fn test_idle_consumer_stops_on_shutdown() {
    let h = Harness::new(AckMode::Manual, &[]);
    let consumer = h.consumer.clone().held_open();
    let shutdown = CancellationToken::new();

    let loop_handle = tokio::spawn(
        ConsumerWorker::new(Box::new(consumer.clone()), h.worker.clone(), shutdown.clone()).run(),
    );
    shutdown.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), loop_handle)
        .await
        .expect("consumer did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert!(consumer.is_closed());
}
