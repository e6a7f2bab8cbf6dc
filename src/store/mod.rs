//! Durable order record: the source of truth for order status.
//!
//! Two implementations: [`MemoryOrderStore`] for tests and local runs, and
//! [`crate::db::orders::PgOrderStore`] over Postgres.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{NewOrder, Order, OrderId, Status};

pub use memory::MemoryOrderStore;

/// Storage contract the producer, reconciler and worker rely on.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order under `identity` with status pending.
    ///
    /// Fails with `Error::Conflict` if the identity is already taken; the
    /// caller retries with a freshly generated identity.
    async fn create(&self, identity: OrderId, new: &NewOrder) -> Result<Order>;

    /// Compare-and-set the status. Returns true only if the stored status was
    /// `from` and is now `to`; false leaves the order untouched.
    ///
    /// Pairs outside the transition table are rejected with
    /// `Error::InvalidTransition`. Claiming (pending -> processing) also
    /// requires the order to not be deleted; later transitions ignore the
    /// flag so an in-flight order can finish.
    async fn transition(&self, identity: &OrderId, from: Status, to: Status) -> Result<bool>;

    /// Set the logical delete flag. False if already deleted.
    async fn mark_deleted(&self, identity: &OrderId) -> Result<bool>;

    /// Identities with status pending that are not deleted, oldest first.
    async fn list_pending_identities(&self) -> Result<Vec<OrderId>>;

    /// Fetch one order. `Error::NotFound` if absent.
    async fn get(&self, identity: &OrderId) -> Result<Order>;

    /// Non-deleted orders of one owner, newest first.
    async fn list_by_owner(&self, owner_identity: &str) -> Result<Vec<Order>>;
}
