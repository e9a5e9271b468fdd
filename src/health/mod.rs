//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Outcome reported (lease released with Success/Failure):
//!     → tracker.rs folds it into EWMAs and consecutive counters
//!     → circuit.rs transition if a threshold is crossed
//!
//! Acquire:
//!     → tracker.is_eligible filters endpoints (no side effects)
//!     → tracker.try_admit claims the chosen one (probe slot if not CLOSED)
//! ```
//!
//! # Design Decisions
//! - Passive only: health comes from callers' reported outcomes
//! - Expired leases never feed the breaker (timeout cause is ambiguous)
//! - Health state is per-endpoint, never pool-wide

pub mod circuit;
pub mod ewma;
pub mod tracker;

pub use circuit::{CircuitState, CircuitTransition};
pub use tracker::{Admission, HealthState, HealthTracker, NEUTRAL_SCORE};
