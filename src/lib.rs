//! # orderq
//!
//! Asynchronous order fulfillment over Postgres.
//!
//! Orders are recorded durably, their identities handed to a pgmq queue,
//! and independent workers claim and advance them through
//! pending -> processing -> succeeded | failed. A reconciliation sweep at
//! worker startup restores queue entries lost to a crash or broker restart.

pub mod broker;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod store;
pub mod telemetry;
