//! Core data model.
//!
//! An order is something that needs fulfilling. It has identity (a content
//! derived hash), a business payload the pipeline never interprets, and a
//! lifecycle status that only the worker advances.

pub mod order;

pub use order::{NewOrder, Order, OrderId, Status};
