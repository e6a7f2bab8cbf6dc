//! Transient delivery queue carrying order identities.
//!
//! FIFO, at-least-once, no deduplication and no acknowledgment: a popped
//! identity is gone from the queue. Consumers must tolerate duplicates and
//! identities whose order already left pending.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::OrderId;

pub use memory::MemoryBroker;

#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Append an identity to the tail.
    async fn enqueue(&self, identity: &OrderId) -> Result<()>;

    /// Pop the head, waiting up to `timeout` for an item to arrive.
    ///
    /// Returns `None` on timeout or when `cancel` fires. Cancellation only
    /// interrupts the wait between pop attempts, never a pop in progress, so
    /// no item is lost to a shutdown.
    async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<OrderId>>;

    /// All queued identities, head first. Removes nothing.
    async fn snapshot(&self) -> Result<Vec<OrderId>>;

    /// Number of queued identities.
    async fn len(&self) -> Result<u64>;

    /// Drop everything in the queue. Returns how many entries were removed.
    async fn purge(&self) -> Result<u64>;
}
