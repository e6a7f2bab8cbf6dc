use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column widths of the orders table.
pub const MAX_OWNER_LEN: usize = 64;
pub const MAX_URL_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// An order tracked through the fulfillment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique, immutable identity. The only thing the queue ever carries.
    pub identity: OrderId,

    /// Who placed the order.
    pub owner_identity: String,

    /// Target of the order. Opaque to the pipeline.
    pub url: String,

    /// Quantity requested. Opaque to the pipeline.
    pub count: i32,

    /// Current lifecycle status.
    pub status: Status,

    /// Logical delete flag. Orthogonal to `status`.
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Eligible for queue delivery: pending and not deleted.
    pub fn is_deliverable(&self) -> bool {
        self.status == Status::Pending && !self.deleted
    }
}

/// Newtype for order identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 chars, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an order.
///
/// Persisted as a small integer: 1=pending, 2=processing, 3=succeeded,
/// 4=failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Recorded, waiting for a worker.
    Pending,
    /// Claimed by a worker, work in flight.
    Processing,
    /// Work finished successfully. Terminal.
    Succeeded,
    /// Work reported failure. Terminal.
    Failed,
}

impl Status {
    /// Can transition from self to `to`?
    ///
    /// This is the whole state machine. Every status write checks it first.
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Processing, Succeeded) | (Processing, Failed)
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }

    /// Integer code stored in the database.
    pub fn code(self) -> i16 {
        match self {
            Status::Pending => 1,
            Status::Processing => 2,
            Status::Succeeded => 3,
            Status::Failed => 4,
        }
    }
}

/// Validate a status transition, returning an error if disallowed.
pub fn validate_transition(from: Status, to: Status) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

impl TryFrom<i16> for Status {
    type Error = Error;

    fn try_from(code: i16) -> Result<Self> {
        match code {
            1 => Ok(Status::Pending),
            2 => Ok(Status::Processing),
            3 => Ok(Status::Succeeded),
            4 => Ok(Status::Failed),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Status::Pending),
            "processing" => Ok(Status::Processing),
            "succeeded" => Ok(Status::Succeeded),
            "failed" => Ok(Status::Failed),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Business payload for a new order. Identity and status are assigned by the
/// store on create.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub(crate) owner_identity: String,
    pub(crate) url: String,
    pub(crate) count: i32,
}

impl NewOrder {
    pub fn new(owner_identity: impl Into<String>, url: impl Into<String>, count: i32) -> Self {
        Self {
            owner_identity: owner_identity.into(),
            url: url.into(),
            count,
        }
    }

    pub fn owner_identity(&self) -> &str {
        &self.owner_identity
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    /// Check the payload fits the schema before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.owner_identity.is_empty() {
            return Err(Error::Validation("owner identity is empty".to_string()));
        }
        if self.owner_identity.len() > MAX_OWNER_LEN {
            return Err(Error::Validation(format!(
                "owner identity longer than {MAX_OWNER_LEN} chars"
            )));
        }
        if self.url.is_empty() {
            return Err(Error::Validation("url is empty".to_string()));
        }
        if self.url.len() > MAX_URL_LEN {
            return Err(Error::Validation(format!(
                "url longer than {MAX_URL_LEN} chars"
            )));
        }
        if self.count <= 0 {
            return Err(Error::Validation(format!(
                "count must be positive, got {}",
                self.count
            )));
        }
        Ok(())
    }
}
