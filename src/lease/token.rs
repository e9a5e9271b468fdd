//! Lease token and outcome types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-bounded grant to use one endpoint.
///
/// Immutable once issued. Outstanding leases consume one unit of their
/// endpoint's `max_concurrent_sessions` until released or swept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: Uuid,
    pub endpoint_id: String,
    /// Endpoint address at issuance.
    pub address: String,
    pub client_id: Option<String>,
    /// Pool-clock milliseconds.
    pub issued_at_ms: u64,
    /// Pool-clock milliseconds.
    pub expires_at_ms: u64,
    /// Half-open probe lease.
    pub probe: bool,
}

impl Lease {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// What the caller observed while using a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseOutcome {
    Success,
    Failure,
    /// Not counted toward health (e.g. the caller gave up for its own reasons).
    Unknown,
}

impl LeaseOutcome {
    /// `Some(success)` for outcomes that feed health tracking.
    pub fn as_success(&self) -> Option<bool> {
        match self {
            LeaseOutcome::Success => Some(true),
            LeaseOutcome::Failure => Some(false),
            LeaseOutcome::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseOutcome::Success => "success",
            LeaseOutcome::Failure => "failure",
            LeaseOutcome::Unknown => "unknown",
        }
    }
}
