//! Queue broker over the pgmq extension via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.pop,
//! pgmq.purge_queue. Messages are the bare identity as a JSON string.
//! Sends also fire a NOTIFY on the queue's channel so a waiting dequeue wakes
//! without polling.

use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broker::QueueBroker;
use crate::error::{Error, Result};
use crate::model::OrderId;
use crate::telemetry::metrics;

/// Poll fallback when no NOTIFY arrives.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`QueueBroker`] over one pgmq queue.
pub struct PgmqBroker {
    pool: PgPool,
    queue_name: String,
    channel: String,
    poll_interval: Duration,
    /// Connected lazily on the first empty pop; dropped on error so the next
    /// wait reconnects.
    listener: Mutex<Option<PgListener>>,
}

impl PgmqBroker {
    /// Queue names end up in a table name (`pgmq.q_<name>`), so only
    /// lowercase ASCII letters, digits and underscores are accepted.
    pub fn new(pool: PgPool, queue_name: &str) -> Result<Self> {
        validate_queue_name(queue_name)?;
        Ok(Self {
            pool,
            queue_name: queue_name.to_string(),
            channel: format!("orderq_{queue_name}"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            listener: Mutex::new(None),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Create the pgmq queue (idempotent).
    pub async fn create(&self) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(&self.queue_name)
            .execute(&self.pool)
            .await?;
        self.count_operation("create");
        Ok(())
    }

    /// Pop the oldest message, if any. pgmq deletes it in the same statement.
    async fn pop(&self) -> Result<Option<OrderId>> {
        let row: Option<(i64, serde_json::Value)> =
            sqlx::query_as("SELECT msg_id, message FROM pgmq.pop($1)")
                .bind(&self.queue_name)
                .fetch_optional(&self.pool)
                .await?;

        self.count_operation(if row.is_some() { "pop" } else { "pop_empty" });

        match row {
            Some((msg_id, message)) => {
                debug!(queue = %self.queue_name, msg_id, "popped message");
                decode_identity(message).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Wait for a send notification or one poll interval, whichever is
    /// first, capped at `max_wait`. Cancellation ends the wait at once, even
    /// while another waiter holds the listener.
    async fn wait_for_send(&self, max_wait: Duration, cancel: &CancellationToken) -> Result<()> {
        let wait = max_wait.min(self.poll_interval);
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
            _ = self.next_notification() => {}
        }
        Ok(())
    }

    /// Resolves on the next NOTIFY for this queue. Stays pending when no
    /// listener can be connected or the listener just failed, leaving the
    /// caller on its poll interval.
    async fn next_notification(&self) {
        let mut guard = self.listener.lock().await;

        if guard.is_none() {
            match PgListener::connect_with(&self.pool).await {
                Ok(mut listener) => match listener.listen(&self.channel).await {
                    Ok(()) => *guard = Some(listener),
                    Err(e) => warn!("PgListener listen error: {e}, falling back to poll"),
                },
                Err(e) => warn!("PgListener connect error: {e}, falling back to poll"),
            }
        }

        let received = match guard.as_mut() {
            Some(listener) => match listener.recv().await {
                Ok(_) => true,
                Err(e) => {
                    warn!("PgListener error: {e}, falling back to poll");
                    *guard = None;
                    false
                }
            },
            None => false,
        };
        drop(guard);

        if !received {
            std::future::pending::<()>().await;
        }
    }

    fn count_operation(&self, operation: &'static str) {
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.queue_name.clone()),
                KeyValue::new("operation", operation),
            ],
        );
    }
}

#[async_trait]
impl QueueBroker for PgmqBroker {
    async fn enqueue(&self, identity: &OrderId) -> Result<()> {
        let payload = serde_json::Value::String(identity.0.clone());
        let msg_id: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(&self.queue_name)
            .bind(&payload)
            .bind(0i32)
            .fetch_one(&self.pool)
            .await?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(&identity.0)
            .execute(&self.pool)
            .await?;

        debug!(queue = %self.queue_name, msg_id = msg_id.0, order = identity.short(), "sent message");
        self.count_operation("send");
        Ok(())
    }

    async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<OrderId>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(identity) = self.pop().await? {
                return Ok(Some(identity));
            }
            let now = tokio::time::Instant::now();
            if cancel.is_cancelled() || now >= deadline {
                return Ok(None);
            }
            self.wait_for_send(deadline - now, cancel).await?;
        }
    }

    async fn snapshot(&self) -> Result<Vec<OrderId>> {
        // Queue name is validated on construction.
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(&format!(
            "SELECT message FROM pgmq.q_{} ORDER BY msg_id",
            self.queue_name
        ))
        .fetch_all(&self.pool)
        .await?;
        self.count_operation("snapshot");

        rows.into_iter().map(|(m,)| decode_identity(m)).collect()
    }

    async fn len(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as(&format!(
            "SELECT count(*) FROM pgmq.q_{}",
            self.queue_name
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.max(0) as u64)
    }

    async fn purge(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.purge_queue($1)")
            .bind(&self.queue_name)
            .fetch_one(&self.pool)
            .await?;
        self.count_operation("purge");
        Ok(row.0.max(0) as u64)
    }
}

fn validate_queue_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 47
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid queue name '{name}': use 1-47 chars of [a-z0-9_]"
        )))
    }
}

fn decode_identity(message: serde_json::Value) -> Result<OrderId> {
    match message {
        serde_json::Value::String(s) if !s.is_empty() => Ok(OrderId(s)),
        other => Err(Error::Payload(format!("expected identity string, got {other}"))),
    }
}
