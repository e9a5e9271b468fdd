//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed task (sweeper, config reload, admin) exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves → trigger()
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; tasks subscribe before they are spawned
//! - Outstanding leases are not waited on; the pool is in-memory only

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
