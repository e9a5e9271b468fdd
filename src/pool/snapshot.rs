//! Read models exported by the pool.

use serde::{Deserialize, Serialize};

use crate::health::CircuitState;

/// Per-endpoint telemetry row.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub id: String,
    pub address: String,
    pub region: Option<String>,
    pub weight: f64,
    pub max_concurrent_sessions: usize,
    pub circuit_state: CircuitState,
    pub success_ewma: f64,
    pub latency_ewma: f64,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    pub total_requests: u64,
    pub active_leases: usize,
    pub probe_in_flight: bool,
    pub in_warmup: bool,
    pub score: f64,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub expired_leases: usize,
    pub pruned_bindings: usize,
}

/// Outcome of applying a new endpoint list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Ids that should have been removed but still hold leases.
    pub retained: Vec<String>,
    /// Ids rejected by validation or registration.
    pub rejected: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.retained.is_empty()
            && self.rejected.is_empty()
    }
}
