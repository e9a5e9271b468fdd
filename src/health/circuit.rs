//! Circuit breaker state.
//!
//! # States
//! - Closed: normal operation, endpoint receives traffic
//! - Open: endpoint assumed down, excluded from selection
//! - Half-Open: a single probe lease is testing recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: probe admitted after cooldown (compare-and-swap)
//! Half-Open → Closed: consecutive_successes >= recovery_threshold
//! Half-Open → Open: any failure
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free circuit state cell.
#[derive(Debug)]
pub struct AtomicCircuit(AtomicU8);

impl AtomicCircuit {
    pub fn new(state: CircuitState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> CircuitState {
        CircuitState::from(self.0.load(Ordering::Acquire))
    }

    /// Move `from → to`. Exactly one concurrent caller wins.
    pub fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A state change produced by an outcome report or probe admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    /// Closed → Open.
    Opened,
    /// Open → Half-Open.
    ProbeAdmitted,
    /// Half-Open → Open.
    Reopened,
    /// Half-Open → Closed.
    Recovered,
}

impl CircuitTransition {
    pub fn target(&self) -> CircuitState {
        match self {
            CircuitTransition::Opened | CircuitTransition::Reopened => CircuitState::Open,
            CircuitTransition::ProbeAdmitted => CircuitState::HalfOpen,
            CircuitTransition::Recovered => CircuitState::Closed,
        }
    }

    /// True when the endpoint just stopped being routable.
    pub fn is_opening(&self) -> bool {
        self.target() == CircuitState::Open
    }
}
