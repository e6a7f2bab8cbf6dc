//! Content-derived order identities.
//!
//! SHA-256 over the business payload plus a timestamp and a random nonce,
//! hex encoded. The nonce means a regenerated identity differs even when two
//! calls land on the same clock tick.

use sha2::{Digest, Sha256};

use crate::model::{NewOrder, OrderId};

/// Generate a fresh identity for a new order.
pub fn generate(new: &NewOrder) -> OrderId {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let raw = format!(
        "{}_{}_{}{}{}",
        new.owner_identity,
        new.url,
        new.count,
        nanos,
        uuid::Uuid::new_v4()
    );
    OrderId(hex::encode(Sha256::digest(raw.as_bytes())))
}
