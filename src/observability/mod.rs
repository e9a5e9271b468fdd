//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool operations produce:
//!     → tracing events (structured fields: endpoint, lease_id, client_id)
//!     → metrics.rs (counters on acquire/release/transition/expiry)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint
//!     → admin API (`snapshot()` read model)
//! ```

pub mod logging;
pub mod metrics;
