//! In-memory queue broker.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::QueueBroker;
use crate::error::Result;
use crate::model::OrderId;

/// A FIFO list of identities shared by producers and workers in one process.
#[derive(Default)]
pub struct MemoryBroker {
    queue: Mutex<VecDeque<OrderId>>,
    ready: Notify,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBroker for MemoryBroker {
    async fn enqueue(&self, identity: &OrderId) -> Result<()> {
        self.queue.lock().await.push_back(identity.clone());
        self.ready.notify_one();
        Ok(())
    }

    async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<OrderId>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before popping so an enqueue between the pop
            // and the wait is not missed.
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(identity) = self.queue.lock().await.pop_front() {
                return Ok(Some(identity));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
                _ = &mut notified => {}
            }
        }
    }

    async fn snapshot(&self) -> Result<Vec<OrderId>> {
        Ok(self.queue.lock().await.iter().cloned().collect())
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.queue.lock().await.len() as u64)
    }

    async fn purge(&self) -> Result<u64> {
        let mut queue = self.queue.lock().await;
        let removed = queue.len() as u64;
        queue.clear();
        Ok(removed)
    }
}
