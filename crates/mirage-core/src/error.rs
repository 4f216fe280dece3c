//! Request failure taxonomy.
//!
//! Every rejected mutation rolls back. What happens *next* depends on
//! the class of failure:
//!
//! - **Transport** — network error, non-2xx. The optimistic UI simply
//!   reverts; logged as a warning, no user-facing surface.
//! - **Conflict** — the server rejected because our view was stale.
//!   Reverts *and* surfaces a typed reason on request-scoped store
//!   state so the UI can prompt a retry/reload.
//!
//! Stale or duplicate reconciliation messages are not errors at all:
//! dequeue and delta application are idempotent no-ops on unknown ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Machine-readable reason the server rejected a stale mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    /// The entity was modified since the client last saw it.
    UpdatedAtMismatch,
    /// The mutation was built against a delta the server has since
    /// superseded.
    DeltaIdMismatch,
}

impl ConflictReason {
    /// The wire code carried in rejection payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdatedAtMismatch => "updated-at-mismatch",
            Self::DeltaIdMismatch => "delta-id-mismatch",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown conflict-reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conflict reason '{raw}': expected updated-at-mismatch or delta-id-mismatch")]
pub struct UnknownConflictReason {
    pub raw: String,
}

impl FromStr for ConflictReason {
    type Err = UnknownConflictReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated-at-mismatch" => Ok(Self::UpdatedAtMismatch),
            "delta-id-mismatch" => Ok(Self::DeltaIdMismatch),
            _ => Err(UnknownConflictReason { raw: s.to_string() }),
        }
    }
}

/// Why a mutation's request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestError {
    /// The request never completed: network failure or non-2xx status.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server refused the mutation because the client's view of
    /// the entity was stale.
    #[error("conflict: {0}")]
    Conflict(ConflictReason),
}

impl RequestError {
    /// Whether this failure should surface to UI-facing state (only
    /// semantic conflicts do; transport failures revert silently).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
