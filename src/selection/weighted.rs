//! Health-biased weighted random selection.
//!
//! Effective weight is `weight * max(score, epsilon)`. Candidates sharing an
//! identical effective weight form one bucket; the draw picks a bucket in
//! proportion to its total mass, and inside a bucket the candidate picked
//! least often so far wins (ties on that broken by id). Only committed picks
//! count towards that tally.

use dashmap::DashMap;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PoolError;
use crate::health::NEUTRAL_SCORE;
use crate::registry::ProxyEndpoint;
use crate::selection::{sticky_match, SelectionStrategy};

#[derive(Debug)]
pub struct WeightedRandom {
    epsilon: f64,
    selections: DashMap<String, u64>,
}

impl WeightedRandom {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            selections: DashMap::new(),
        }
    }

    /// How many committed picks an endpoint has had.
    pub fn selection_count(&self, endpoint_id: &str) -> u64 {
        self.selections.get(endpoint_id).map(|c| *c).unwrap_or(0)
    }

    fn effective_weight(&self, endpoint: &ProxyEndpoint, scores: &HashMap<String, f64>) -> f64 {
        let score = scores.get(&endpoint.id).copied().unwrap_or(NEUTRAL_SCORE);
        let score = if score.is_finite() { score.max(self.epsilon) } else { self.epsilon };
        endpoint.weight * score
    }
}

impl SelectionStrategy for WeightedRandom {
    fn select(
        &self,
        candidates: &[Arc<ProxyEndpoint>],
        scores: &HashMap<String, f64>,
        sticky_hint: Option<&str>,
    ) -> Result<String, PoolError> {
        if candidates.is_empty() {
            return Err(PoolError::NoEligibleEndpoint);
        }
        if let Some(id) = sticky_match(candidates, sticky_hint) {
            return Ok(id);
        }

        let mut buckets: Vec<(f64, Vec<&Arc<ProxyEndpoint>>)> = Vec::new();
        for candidate in candidates {
            let weight = self.effective_weight(candidate, scores);
            match buckets.iter_mut().find(|(w, _)| w.to_bits() == weight.to_bits()) {
                Some((_, members)) => members.push(candidate),
                None => buckets.push((weight, vec![candidate])),
            }
        }

        let total: f64 = buckets.iter().map(|(w, m)| w * m.len() as f64).sum();
        let mut chosen = buckets.len() - 1;
        if total.is_finite() && total > 0.0 {
            let mut point = rand::thread_rng().gen_range(0.0..total);
            for (i, (w, members)) in buckets.iter().enumerate() {
                let mass = w * members.len() as f64;
                if point < mass {
                    chosen = i;
                    break;
                }
                point -= mass;
            }
        }

        let id = buckets[chosen]
            .1
            .iter()
            .min_by(|a, b| {
                self.selection_count(&a.id)
                    .cmp(&self.selection_count(&b.id))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|e| e.id.clone())
            .ok_or(PoolError::NoEligibleEndpoint)?;
        Ok(id)
    }

    fn commit(&self, endpoint_id: &str) {
        *self.selections.entry(endpoint_id.to_string()).or_insert(0) += 1;
    }

    fn forget(&self, endpoint_id: &str) {
        self.selections.remove(endpoint_id);
    }
}
