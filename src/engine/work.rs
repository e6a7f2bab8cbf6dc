//! The unit of work performed for a claimed order.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Order;

/// What a fulfillment attempt reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Succeeded { duration_ms: u64 },
    Failed { error: String, duration_ms: u64 },
}

impl WorkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkOutcome::Succeeded { .. })
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            WorkOutcome::Succeeded { duration_ms } | WorkOutcome::Failed { duration_ms, .. } => {
                *duration_ms
            }
        }
    }
}

/// Fulfils one order. Must finish in bounded time; the worker applies no
/// timeout of its own.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn perform(&self, order: &Order) -> WorkOutcome;
}

/// Plain predicates work as fulfillment: true is success.
#[async_trait]
impl<F> Fulfillment for F
where
    F: Fn(&Order) -> bool + Send + Sync,
{
    async fn perform(&self, order: &Order) -> WorkOutcome {
        let start = Instant::now();
        let ok = self(order);
        let duration_ms = start.elapsed().as_millis() as u64;
        if ok {
            WorkOutcome::Succeeded { duration_ms }
        } else {
            WorkOutcome::Failed {
                error: "fulfillment reported failure".to_string(),
                duration_ms,
            }
        }
    }
}

/// Sleeps for a fixed time, then succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedFulfillment {
    pub delay: Duration,
}

impl SimulatedFulfillment {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Fulfillment for SimulatedFulfillment {
    async fn perform(&self, order: &Order) -> WorkOutcome {
        let start = Instant::now();
        debug!(order = order.identity.short(), url = %order.url, count = order.count, "simulating work");
        tokio::time::sleep(self.delay).await;
        WorkOutcome::Succeeded {
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Runs an external executable per order. Exit status 0 is success.
///
/// The order is passed through the environment: `ORDERQ_ORDER_ID`,
/// `ORDERQ_OWNER`, `ORDERQ_URL`, `ORDERQ_COUNT`.
#[derive(Debug, Clone)]
pub struct CommandFulfillment {
    command: PathBuf,
}

impl CommandFulfillment {
    /// Relative paths resolve against the current directory at construction.
    pub fn new(command: impl AsRef<Path>) -> Result<Self> {
        let command = command.as_ref();
        let command = if command.is_relative() {
            std::env::current_dir()?.join(command)
        } else {
            command.to_path_buf()
        };
        Ok(Self { command })
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    async fn run(&self, order: &Order) -> Result<()> {
        debug!(
            order = order.identity.short(),
            command = %self.command.display(),
            "running fulfillment command"
        );

        let status = Command::new(&self.command)
            .env("ORDERQ_ORDER_ID", order.identity.as_str())
            .env("ORDERQ_OWNER", &order.owner_identity)
            .env("ORDERQ_URL", &order.url)
            .env("ORDERQ_COUNT", order.count.to_string())
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "fulfillment command exited with status {}",
                status.code().unwrap_or(-1)
            )))
        }
    }
}

#[async_trait]
impl Fulfillment for CommandFulfillment {
    async fn perform(&self, order: &Order) -> WorkOutcome {
        let start = Instant::now();
        let result = self.run(order).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(()) => WorkOutcome::Succeeded { duration_ms },
            Err(e) => WorkOutcome::Failed {
                error: e.to_string(),
                duration_ms,
            },
        }
    }
}
