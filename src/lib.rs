//! Health-aware dynamic endpoint pool.
//!
//! Callers lease an endpoint with [`DynamicProxyPool::acquire`], do their
//! work, then [`DynamicProxyPool::release`] the lease with what they saw.
//! Outcomes feed per-endpoint EWMAs and a circuit breaker; selection is
//! weighted by configured weight times live health score.

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod lease;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod registry;
pub mod selection;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PoolConfig, PoolSettings, StrategyKind};
pub use error::PoolError;
pub use health::{CircuitState, HealthState};
pub use lease::{Lease, LeaseOutcome};
pub use lifecycle::Shutdown;
pub use pool::{DynamicProxyPool, EndpointSnapshot, LeaseSweeper, SweepReport};
pub use registry::ProxyEndpoint;
