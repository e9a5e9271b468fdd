//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Eligible, under-capacity candidates + live scores + sticky hint
//!     → sticky hint present among candidates? return it
//!     → strategy picks one:
//!         - weighted.rs (weight × score, randomized; default)
//!         - round_robin.rs (rotate through candidates)
//! ```
//!
//! # Design Decisions
//! - Strategies never see ineligible endpoints; filtering happens before
//! - Randomized choice avoids every caller converging on the single best
//!   endpoint the moment another one degrades

pub mod round_robin;
pub mod weighted;

pub use round_robin::RoundRobin;
pub use weighted::WeightedRandom;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::{PoolSettings, StrategyKind};
use crate::error::PoolError;
use crate::registry::ProxyEndpoint;

/// Picks one endpoint id out of the candidates.
pub trait SelectionStrategy: Send + Sync + Debug {
    /// Returns `NoEligibleEndpoint` only when `candidates` is empty.
    fn select(
        &self,
        candidates: &[Arc<ProxyEndpoint>],
        scores: &HashMap<String, f64>,
        sticky_hint: Option<&str>,
    ) -> Result<String, PoolError>;

    /// The pick was turned into a lease. Picks abandoned because admission or
    /// reservation failed are never committed.
    fn commit(&self, _endpoint_id: &str) {}

    /// Drop per-endpoint bookkeeping for a deregistered endpoint.
    fn forget(&self, _endpoint_id: &str) {}
}

/// The sticky hint, if it names one of the candidates.
pub fn sticky_match(candidates: &[Arc<ProxyEndpoint>], sticky_hint: Option<&str>) -> Option<String> {
    let hint = sticky_hint?;
    candidates.iter().find(|c| c.id == hint).map(|c| c.id.clone())
}

/// Strategy configured by `pool.strategy`.
pub fn from_settings(settings: &PoolSettings) -> Box<dyn SelectionStrategy> {
    match settings.strategy {
        StrategyKind::WeightedRandom => Box::new(WeightedRandom::new(settings.score_epsilon)),
        StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
    }
}
