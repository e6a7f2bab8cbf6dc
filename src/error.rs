//! Error types for orderq.

use thiserror::Error;

use crate::model::Status;

#[derive(Debug, Error)]
pub enum Error {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("invalid status value: {0}")]
    InvalidStatus(String),

    #[error("invalid order: {0}")]
    Validation(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad queue payload: {0}")]
    Payload(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure is a connectivity problem worth retrying.
    ///
    /// Everything else (missing rows, bad payloads, state machine violations)
    /// will fail the same way on the next attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Unavailable(_) | Error::Io(_) => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
