//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in secrecy::SecretString so it
//! never lands in a log line.

pub mod secrets;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

pub const DEFAULT_QUEUE: &str = "task_queue";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Name of the pgmq queue shared by producers and workers.
    pub queue_name: String,
    /// How long one blocking dequeue waits before the loop re-checks shutdown.
    pub dequeue_timeout: Duration,
    /// Pause before retrying a step that hit a transient backend failure.
    pub retry_delay: Duration,
    /// Duration of the simulated unit of work.
    pub work_delay: Duration,
    /// External executable that fulfils an order, if any.
    pub work_command: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let queue_name =
            std::env::var("ORDERQ_QUEUE").unwrap_or_else(|_| DEFAULT_QUEUE.to_string());
        if queue_name.is_empty() {
            return Err(Error::Config("ORDERQ_QUEUE is empty".to_string()));
        }

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            queue_name,
            dequeue_timeout: Duration::from_secs(parsed_var("ORDERQ_DEQUEUE_TIMEOUT_SECS", 10)?),
            retry_delay: Duration::from_millis(parsed_var("ORDERQ_RETRY_DELAY_MS", 1000)?),
            work_delay: Duration::from_millis(parsed_var("ORDERQ_WORK_DELAY_MS", 5000)?),
            work_command: std::env::var("ORDERQ_WORK_COMMAND").ok().map(PathBuf::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
