//! Fulfillment pipeline: producer, reconciliation sweep, worker loop.

pub mod producer;
pub mod reconcile;
pub mod work;
pub mod worker;

pub use producer::{Producer, SubmitResult};
pub use reconcile::{ReconcileReport, reconcile};
pub use work::{CommandFulfillment, Fulfillment, SimulatedFulfillment, WorkOutcome};
pub use worker::{Delivery, RunSummary, SkipReason, Worker, WorkerConfig};
