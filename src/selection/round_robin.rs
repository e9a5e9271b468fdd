//! Round-robin selection strategy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::PoolError;
use crate::registry::ProxyEndpoint;
use crate::selection::{sticky_match, SelectionStrategy};

/// Rotates through candidates, ignoring weight and score.
/// Sticky hints still win.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select(
        &self,
        candidates: &[Arc<ProxyEndpoint>],
        _scores: &HashMap<String, f64>,
        sticky_hint: Option<&str>,
    ) -> Result<String, PoolError> {
        if candidates.is_empty() {
            return Err(PoolError::NoEligibleEndpoint);
        }
        if let Some(id) = sticky_match(candidates, sticky_hint) {
            return Ok(id);
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Ok(candidates[index].id.clone())
    }
}
