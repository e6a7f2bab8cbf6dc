//! Order creation path: record the order, then hand its identity to the queue.
//!
//! The two writes are not atomic. An order whose enqueue failed stays pending
//! in the store and is restored by the next reconciliation sweep.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{info, warn};

use crate::broker::QueueBroker;
use crate::error::{Error, Result};
use crate::identity;
use crate::model::{NewOrder, Order, OrderId};
use crate::store::OrderStore;
use crate::telemetry::metrics;

/// Attempts at finding an unused identity before giving up.
const MAX_CREATE_ATTEMPTS: u32 = 3;

/// What happened when an order was submitted.
#[derive(Debug)]
pub enum SubmitResult {
    /// Recorded and queued.
    Queued(Box<Order>),
    /// Recorded, but the enqueue failed. Reconciliation will queue it.
    Unqueued { order: Box<Order>, error: String },
}

impl SubmitResult {
    pub fn order(&self) -> &Order {
        match self {
            SubmitResult::Queued(order) | SubmitResult::Unqueued { order, .. } => order,
        }
    }
}

pub struct Producer<S, Q> {
    store: Arc<S>,
    broker: Arc<Q>,
}

impl<S, Q> Clone for Producer<S, Q> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<S: OrderStore, Q: QueueBroker> Producer<S, Q> {
    pub fn new(store: Arc<S>, broker: Arc<Q>) -> Self {
        Self { store, broker }
    }

    /// Record a new order and queue it for a worker.
    pub async fn submit(&self, new: NewOrder) -> Result<SubmitResult> {
        if let Err(e) = new.validate() {
            metrics::orders_submitted().add(1, &[KeyValue::new("result", "error")]);
            return Err(e);
        }

        let order = match self.create_with_fresh_identity(&new).await {
            Ok(order) => order,
            Err(e) => {
                metrics::orders_submitted().add(1, &[KeyValue::new("result", "error")]);
                return Err(e);
            }
        };

        match self.broker.enqueue(&order.identity).await {
            Ok(()) => {
                info!(
                    order = order.identity.short(),
                    owner = %order.owner_identity,
                    "order created and queued"
                );
                metrics::orders_submitted().add(1, &[KeyValue::new("result", "queued")]);
                Ok(SubmitResult::Queued(Box::new(order)))
            }
            Err(e) => {
                warn!(
                    order = order.identity.short(),
                    error = %e,
                    "order recorded but not queued; reconciliation will restore it"
                );
                metrics::orders_submitted().add(1, &[KeyValue::new("result", "unqueued")]);
                Ok(SubmitResult::Unqueued {
                    order: Box::new(order),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Logically delete an order. `Ok(false)` if it was already deleted.
    pub async fn delete(&self, identity: &OrderId) -> Result<bool> {
        // Surfaces NotFound for unknown identities.
        self.store.get(identity).await?;
        let deleted = self.store.mark_deleted(identity).await?;
        if deleted {
            info!(order = identity.short(), "order deleted");
        }
        Ok(deleted)
    }

    async fn create_with_fresh_identity(&self, new: &NewOrder) -> Result<Order> {
        let mut attempt = 1;
        loop {
            let identity = identity::generate(new);
            match self.store.create(identity, new).await {
                Err(Error::Conflict(reason)) if attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(attempt, %reason, "identity collision, regenerating");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
