//! Order processing span helpers.

use tracing::Span;

use crate::model::{OrderId, Status};

/// Start a span covering one delivery of an order to a worker.
///
/// The `order.status` field is declared empty and updated by
/// [`record_state_transition`].
pub fn start_order_span(worker_id: &str, identity: &OrderId) -> Span {
    tracing::info_span!(
        "order.process",
        "worker.id" = worker_id,
        "order.id" = identity.short(),
        "order.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the span and emit an `info` event in it.
pub fn record_state_transition(span: &Span, from: Status, to: Status) {
    span.record("order.status", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(%from, %to, "state_transition");
    });
}
