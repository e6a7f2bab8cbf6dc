//! Metric instrument factories for orderq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"orderq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("orderq")
}

/// Counter: orders submitted by the producer.
/// Labels: `result` ("queued" | "unqueued" | "error").
pub fn orders_submitted() -> Counter<u64> {
    meter()
        .u64_counter("orderq.orders.submitted")
        .with_description("Number of orders submitted")
        .build()
}

/// Counter: successful order status transitions.
/// Labels: `from`, `to`.
pub fn order_transitions() -> Counter<u64> {
    meter()
        .u64_counter("orderq.orders.transitions")
        .with_description("Number of order status transitions")
        .build()
}

/// Counter: deliveries the worker dropped without doing work.
/// Labels: `reason` ("not_found" | "deleted" | "conflict").
pub fn deliveries_skipped() -> Counter<u64> {
    meter()
        .u64_counter("orderq.deliveries.skipped")
        .with_description("Deliveries skipped as stale or duplicate")
        .build()
}

/// Counter: queue-level operations (send, pop, snapshot, purge).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("orderq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: identities re-enqueued by the reconciliation sweep.
pub fn orders_restored() -> Counter<u64> {
    meter()
        .u64_counter("orderq.reconcile.restored")
        .with_description("Pending orders restored to the queue")
        .build()
}

/// Histogram: fulfillment duration in milliseconds.
/// Labels: `outcome` ("succeeded" | "failed").
pub fn work_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("orderq.work.duration_ms")
        .with_description("Fulfillment duration in milliseconds")
        .with_unit("ms")
        .build()
}
