//! Worker loop: dequeue identities, claim orders, run the work, record the
//! outcome.
//!
//! Any number of workers may share one store and one queue. Duplicate and
//! racing deliveries are safe because the claim is a compare-and-set on the
//! stored status: only the delivery that observes pending does the work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use super::reconcile::reconcile;
use super::work::{Fulfillment, WorkOutcome};
use crate::broker::QueueBroker;
use crate::error::{Error, Result};
use crate::model::{OrderId, Status};
use crate::store::OrderStore;
use crate::telemetry::metrics;
use crate::telemetry::order::{record_state_transition, start_order_span};

/// Configuration for a worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name used in logs and spans.
    pub worker_id: String,
    /// Upper bound on one blocking dequeue. Shutdown is also observed while
    /// waiting, so this mostly sets how often an idle worker logs nothing.
    pub dequeue_timeout: Duration,
    /// Pause before retrying a step that hit a transient failure.
    pub retry_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Self {
            worker_id: format!("worker-{}-{}", std::process::id(), &nonce[..6]),
            dequeue_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Why a delivery was dropped without work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No order with that identity.
    NotFound,
    /// The order was logically deleted before it was claimed.
    Deleted,
}

/// What became of one delivered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Claimed, worked, and moved to this terminal status.
    Processed(Status),
    /// Stale delivery, nothing to do.
    Skipped(SkipReason),
    /// The claim lost: another delivery already took the order out of
    /// pending.
    Conflict,
    /// Shutdown arrived before the claim; the identity went back on the
    /// queue.
    Requeued,
}

/// Counters for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Identities restored by the startup reconciliation.
    pub restored: usize,
    pub deliveries: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub conflicts: u64,
    pub requeued: u64,
    pub errors: u64,
}

impl RunSummary {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Processed(Status::Succeeded) => self.succeeded += 1,
            Delivery::Processed(_) => self.failed += 1,
            Delivery::Skipped(_) => self.skipped += 1,
            Delivery::Conflict => self.conflicts += 1,
            Delivery::Requeued => self.requeued += 1,
        }
    }
}

/// A consumer of the order queue.
pub struct Worker<S, Q, F> {
    store: Arc<S>,
    broker: Arc<Q>,
    fulfillment: Arc<F>,
    config: WorkerConfig,
}

impl<S, Q, F> Clone for Worker<S, Q, F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            broker: Arc::clone(&self.broker),
            fulfillment: Arc::clone(&self.fulfillment),
            config: self.config.clone(),
        }
    }
}

impl<S, Q, F> Worker<S, Q, F>
where
    S: OrderStore,
    Q: QueueBroker,
    F: Fulfillment,
{
    pub fn new(store: Arc<S>, broker: Arc<Q>, fulfillment: Arc<F>, config: WorkerConfig) -> Self {
        Self {
            store,
            broker,
            fulfillment,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Reconcile once, then serve the queue until `shutdown` is cancelled.
    ///
    /// Only a failed startup reconciliation is returned as an error; failures
    /// while serving are logged and the loop carries on.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunSummary> {
        let report = reconcile(&*self.store, &*self.broker).await?;
        let mut summary = RunSummary {
            restored: report.restored.len(),
            ..RunSummary::default()
        };

        info!(worker = %self.config.worker_id, "worker started");

        while !shutdown.is_cancelled() {
            let identity = match self
                .broker
                .dequeue(self.config.dequeue_timeout, &shutdown)
                .await
            {
                Ok(Some(identity)) => identity,
                Ok(None) => continue,
                Err(e) => {
                    if e.is_transient() {
                        warn!(error = %e, "dequeue failed, retrying");
                    } else {
                        error!(error = %e, "dequeue failed");
                        summary.errors += 1;
                    }
                    self.pause(&shutdown).await;
                    continue;
                }
            };

            summary.deliveries += 1;
            match self.handle(&identity, &shutdown).await {
                Ok(delivery) => summary.record(delivery),
                Err(e) => {
                    error!(order = identity.short(), error = %e, "delivery failed");
                    summary.errors += 1;
                }
            }
        }

        info!(
            worker = %self.config.worker_id,
            deliveries = summary.deliveries,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "worker stopped"
        );
        Ok(summary)
    }

    /// Process one delivered identity.
    ///
    /// Once the claim succeeds the work runs to completion and its outcome is
    /// recorded, whatever the shutdown token says. If shutdown interrupts the
    /// retries before the claim, the identity is put back on the queue.
    pub async fn handle(&self, identity: &OrderId, shutdown: &CancellationToken) -> Result<Delivery> {
        let span = start_order_span(&self.config.worker_id, identity);

        async {
            let order = match self
                .retry(shutdown, "load order", || self.store.get(identity))
                .await
            {
                Ok(Some(order)) => order,
                Ok(None) => return self.requeue(identity).await,
                Err(Error::NotFound(_)) => {
                    debug!("no such order, dropping delivery");
                    return Ok(skip(SkipReason::NotFound));
                }
                Err(e) => return Err(e),
            };

            if order.deleted {
                debug!("order deleted, dropping delivery");
                return Ok(skip(SkipReason::Deleted));
            }

            let claimed = match self
                .retry(shutdown, "claim order", || {
                    self.store
                        .transition(identity, Status::Pending, Status::Processing)
                })
                .await?
            {
                Some(claimed) => claimed,
                None => return self.requeue(identity).await,
            };
            if !claimed {
                debug!(status = %order.status, "order already claimed or no longer pending");
                metrics::deliveries_skipped().add(1, &[KeyValue::new("reason", "conflict")]);
                return Ok(Delivery::Conflict);
            }
            note_transition(&span, Status::Pending, Status::Processing);

            let outcome = self.fulfillment.perform(&order).await;
            let to = match &outcome {
                WorkOutcome::Succeeded { duration_ms } => {
                    info!(duration_ms, "work succeeded");
                    Status::Succeeded
                }
                WorkOutcome::Failed { error, duration_ms } => {
                    warn!(%error, duration_ms, "work failed");
                    Status::Failed
                }
            };
            metrics::work_duration_ms().record(
                outcome.duration_ms() as f64,
                &[KeyValue::new("outcome", to.to_string())],
            );

            if self.finish(identity, to, shutdown).await? {
                note_transition(&span, Status::Processing, to);
                Ok(Delivery::Processed(to))
            } else {
                Err(Error::Conflict(format!(
                    "order {identity} left processing before it was finished"
                )))
            }
        }
        .instrument(span.clone())
        .await
    }

    /// Run `op`, retrying transient failures every `retry_delay`.
    ///
    /// `Ok(None)` means shutdown was requested while waiting to retry.
    async fn retry<T, Op, Fut>(
        &self,
        shutdown: &CancellationToken,
        step: &str,
        mut op: Op,
    ) -> Result<Option<T>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_transient() => {
                    warn!(step, error = %e, "transient failure, retrying");
                    if !self.pause(shutdown).await {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Record the terminal status of a claimed order.
    ///
    /// Transient failures are retried even after shutdown is requested. No
    /// sweep moves an order out of processing.
    async fn finish(
        &self,
        identity: &OrderId,
        to: Status,
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        loop {
            match self.store.transition(identity, Status::Processing, to).await {
                Err(e) if e.is_transient() => {
                    if shutdown.is_cancelled() {
                        warn!(error = %e, "transient failure recording outcome, retrying past shutdown");
                    } else {
                        warn!(step = "finish order", error = %e, "transient failure, retrying");
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    /// Sleep for `retry_delay`. False if shutdown cut the sleep short.
    async fn pause(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.retry_delay) => true,
        }
    }

    async fn requeue(&self, identity: &OrderId) -> Result<Delivery> {
        match self.broker.enqueue(identity).await {
            Ok(()) => {
                info!("shutdown before claim, identity returned to queue");
                Ok(Delivery::Requeued)
            }
            Err(e) => {
                error!(
                    error = %e,
                    "shutdown before claim, identity could not be returned to queue; \
                     the next reconciliation sweep restores it"
                );
                Err(e)
            }
        }
    }
}

fn skip(reason: SkipReason) -> Delivery {
    let label = match reason {
        SkipReason::NotFound => "not_found",
        SkipReason::Deleted => "deleted",
    };
    metrics::deliveries_skipped().add(1, &[KeyValue::new("reason", label)]);
    Delivery::Skipped(reason)
}

fn note_transition(span: &tracing::Span, from: Status, to: Status) {
    record_state_transition(span, from, to);
    metrics::order_transitions().add(
        1,
        &[
            KeyValue::new("from", from.to_string()),
            KeyValue::new("to", to.to_string()),
        ],
    );
}
