//! In-memory order store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::OrderStore;
use crate::error::{Error, Result};
use crate::model::order::validate_transition;
use crate::model::{NewOrder, Order, OrderId, Status};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    /// Every status an order has held, in order.
    history: HashMap<OrderId, Vec<Status>>,
}

/// Order store held in process memory. Same contract as the Postgres store,
/// plus a status history per order for inspecting traces.
#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses the order has passed through, starting at pending.
    pub async fn history(&self, identity: &OrderId) -> Vec<Status> {
        self.inner
            .lock()
            .await
            .history
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, identity: OrderId, new: &NewOrder) -> Result<Order> {
        new.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&identity) {
            return Err(Error::Conflict(format!("identity {identity} already exists")));
        }

        let now = Utc::now();
        let order = Order {
            identity: identity.clone(),
            owner_identity: new.owner_identity.clone(),
            url: new.url.clone(),
            count: new.count,
            status: Status::Pending,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(identity.clone(), order.clone());
        inner.history.insert(identity, vec![Status::Pending]);
        Ok(order)
    }

    async fn transition(&self, identity: &OrderId, from: Status, to: Status) -> Result<bool> {
        validate_transition(from, to)?;

        let mut inner = self.inner.lock().await;
        let Some(order) = inner.orders.get_mut(identity) else {
            return Ok(false);
        };
        if order.status != from || (from == Status::Pending && order.deleted) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        inner
            .history
            .entry(identity.clone())
            .or_default()
            .push(to);
        Ok(true)
    }

    async fn mark_deleted(&self, identity: &OrderId) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(identity) {
            Some(order) if !order.deleted => {
                order.deleted = true;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_pending_identities(&self) -> Result<Vec<OrderId>> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| o.is_deliverable())
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        Ok(pending.into_iter().map(|o| o.identity.clone()).collect())
    }

    async fn get(&self, identity: &OrderId) -> Result<Order> {
        self.inner
            .lock()
            .await
            .orders
            .get(identity)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("order {identity}")))
    }

    async fn list_by_owner(&self, owner_identity: &str) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.owner_identity == owner_identity && !o.deleted)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
