//! Producer: creation, enqueue failure handling, logical delete.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderq::broker::{MemoryBroker, QueueBroker};
use orderq::engine::{Producer, SubmitResult, reconcile};
use orderq::error::{Error, Result};
use orderq::model::{NewOrder, OrderId, Status};
use orderq::store::{MemoryOrderStore, OrderStore};
use tokio_util::sync::CancellationToken;

/// Broker that is down for enqueues but otherwise behaves like memory.
struct DownBroker(MemoryBroker);

#[async_trait]
impl QueueBroker for DownBroker {
    async fn enqueue(&self, _identity: &OrderId) -> Result<()> {
        Err(Error::Unavailable("queue offline".to_string()))
    }

    async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<OrderId>> {
        self.0.dequeue(timeout, cancel).await
    }

    async fn snapshot(&self) -> Result<Vec<OrderId>> {
        self.0.snapshot().await
    }

    async fn len(&self) -> Result<u64> {
        self.0.len().await
    }

    async fn purge(&self) -> Result<u64> {
        self.0.purge().await
    }
}

#[tokio::test]
async fn submit_records_pending_order_and_queues_it() {
    let store = Arc::new(MemoryOrderStore::new());
    let broker = Arc::new(MemoryBroker::new());
    let producer = Producer::new(Arc::clone(&store), Arc::clone(&broker));

    let result = producer
        .submit(NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();
    let SubmitResult::Queued(order) = result else {
        panic!("expected queued, got {result:?}");
    };

    assert_eq!(order.status, Status::Pending);
    assert_eq!(order.owner_identity, "user-1");
    assert_eq!(order.identity.as_str().len(), 64);
    assert_eq!(store.get(&order.identity).await.unwrap().status, Status::Pending);
    assert_eq!(broker.snapshot().await.unwrap(), vec![order.identity.clone()]);
}

#[tokio::test]
async fn identical_payloads_get_distinct_identities() {
    let store = Arc::new(MemoryOrderStore::new());
    let broker = Arc::new(MemoryBroker::new());
    let producer = Producer::new(Arc::clone(&store), Arc::clone(&broker));

    let a = producer
        .submit(NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();
    let b = producer
        .submit(NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();

    assert_ne!(a.order().identity, b.order().identity);
    assert_eq!(store.list_pending_identities().await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_enqueue_leaves_order_for_reconciliation() {
    let store = Arc::new(MemoryOrderStore::new());
    let broker = Arc::new(DownBroker(MemoryBroker::new()));
    let producer = Producer::new(Arc::clone(&store), Arc::clone(&broker));

    let result = producer
        .submit(NewOrder::new("user-1", "https://x", 1))
        .await
        .unwrap();
    let SubmitResult::Unqueued { order, error } = result else {
        panic!("expected unqueued, got {result:?}");
    };
    assert!(error.contains("queue offline"));
    assert_eq!(store.get(&order.identity).await.unwrap().status, Status::Pending);

    // Once the queue is back, a sweep restores the order.
    let healthy = MemoryBroker::new();
    let report = reconcile(&*store, &healthy).await.unwrap();
    assert_eq!(report.restored, vec![order.identity.clone()]);
    assert_eq!(healthy.snapshot().await.unwrap(), vec![order.identity]);
}

#[tokio::test]
async fn invalid_order_is_rejected_before_anything_is_written() {
    let store = Arc::new(MemoryOrderStore::new());
    let broker = Arc::new(MemoryBroker::new());
    let producer = Producer::new(Arc::clone(&store), Arc::clone(&broker));

    let err = producer
        .submit(NewOrder::new("user-1", "https://x", 0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    assert!(store.list_pending_identities().await.unwrap().is_empty());
    assert_eq!(broker.len().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_marks_order_once_and_reports_unknown() {
    let store = Arc::new(MemoryOrderStore::new());
    let broker = Arc::new(MemoryBroker::new());
    let producer = Producer::new(Arc::clone(&store), Arc::clone(&broker));

    let identity = producer
        .submit(NewOrder::new("user-1", "https://y", 1))
        .await
        .unwrap()
        .order()
        .identity
        .clone();

    assert!(producer.delete(&identity).await.unwrap());
    assert!(!producer.delete(&identity).await.unwrap());
    assert!(store.get(&identity).await.unwrap().deleted);
    // The queue entry stays; the worker drops it on delivery.
    assert_eq!(broker.len().await.unwrap(), 1);

    let err = producer.delete(&OrderId::new("ghost")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
