//! Startup sweep that puts pending orders missing from the queue back on it.
//!
//! Repairs two windows: a producer that committed an order but died before
//! enqueuing it, and a broker that lost its contents while the store
//! survived. The two reads are not atomic with respect to concurrent
//! producers and workers, so a racing order may be enqueued twice or missed
//! until the next sweep; duplicates are absorbed by the worker's claim.

use std::collections::HashSet;

use tracing::info;

use crate::broker::QueueBroker;
use crate::error::Result;
use crate::model::OrderId;
use crate::store::OrderStore;
use crate::telemetry::metrics;

/// What one sweep saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Deliverable orders in the store.
    pub pending: usize,
    /// Entries in the queue at the time of the snapshot.
    pub queued: usize,
    /// Identities enqueued by this sweep, in creation order.
    pub restored: Vec<OrderId>,
}

/// Enqueue every pending, non-deleted order that is not already queued.
pub async fn reconcile<S, Q>(store: &S, broker: &Q) -> Result<ReconcileReport>
where
    S: OrderStore + ?Sized,
    Q: QueueBroker + ?Sized,
{
    let pending = store.list_pending_identities().await?;
    let snapshot = broker.snapshot().await?;
    let queued: HashSet<&OrderId> = snapshot.iter().collect();

    let missing: Vec<OrderId> = pending
        .iter()
        .filter(|id| !queued.contains(id))
        .cloned()
        .collect();

    for identity in &missing {
        broker.enqueue(identity).await?;
    }

    if !missing.is_empty() {
        metrics::orders_restored().add(missing.len() as u64, &[]);
    }
    info!(
        pending = pending.len(),
        queued = snapshot.len(),
        restored = missing.len(),
        "reconciliation sweep finished"
    );

    Ok(ReconcileReport {
        pending: pending.len(),
        queued: snapshot.len(),
        restored: missing,
    })
}
