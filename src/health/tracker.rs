//! Per-endpoint health tracking.
//!
//! EWMA accumulators and counters sit behind one small mutex per endpoint, so
//! reports for an endpoint apply in the order their callers take the lock.
//! Circuit state, `opened_at` and the probe flag are atomics so eligibility
//! checks never take that lock. Leaving OPEN does take it, so the success
//! streak restarts at zero for the half-open phase.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::clock::Clock;
use crate::config::PoolSettings;
use crate::health::circuit::{AtomicCircuit, CircuitState, CircuitTransition};
use crate::health::ewma::Ewma;
use crate::observability::metrics;
use crate::registry::EndpointRegistry;

/// Score reported while an endpoint is inside its warmup window.
pub const NEUTRAL_SCORE: f64 = 1.0;

/// Result of asking to route one request to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; ordinary lease.
    Regular,
    /// This caller holds the endpoint's single probe slot.
    Probe,
    /// Not routable right now.
    Denied,
}

#[derive(Debug)]
struct HealthStats {
    success: Ewma,
    latency: Ewma,
    consecutive_failures: u64,
    consecutive_successes: u64,
    total_requests: u64,
    /// Scores are trusted once `total_requests` reaches this.
    trusted_after: u64,
}

#[derive(Debug)]
struct EndpointHealth {
    circuit: AtomicCircuit,
    opened_at_ms: AtomicU64,
    probe_in_flight: AtomicBool,
    stats: Mutex<HealthStats>,
}

impl EndpointHealth {
    fn new(warmup_requests: u64) -> Self {
        Self {
            circuit: AtomicCircuit::new(CircuitState::Closed),
            opened_at_ms: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
            stats: Mutex::new(HealthStats {
                success: Ewma::with_initial(1.0),
                latency: Ewma::unseeded(),
                consecutive_failures: 0,
                consecutive_successes: 0,
                total_requests: 0,
                trusted_after: warmup_requests,
            }),
        }
    }

    fn open(&self, from: CircuitState, now: u64) -> bool {
        self.opened_at_ms.store(now, Ordering::Release);
        self.circuit.transition(from, CircuitState::Open)
    }

    fn cooldown_elapsed(&self, now: u64, cooldown_ms: u64) -> bool {
        now.saturating_sub(self.opened_at_ms.load(Ordering::Acquire)) >= cooldown_ms
    }

    /// OPEN to HALF_OPEN. Successes reported while OPEN came from leases
    /// issued before the circuit opened and do not count towards recovery.
    fn begin_half_open(&self) -> bool {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let moved = self.circuit.transition(CircuitState::Open, CircuitState::HalfOpen);
        if moved {
            stats.consecutive_successes = 0;
        }
        moved
    }
}

/// Read-only copy of one endpoint's health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub success_ewma: f64,
    pub latency_ewma: f64,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    pub circuit_state: CircuitState,
    /// Pool-clock milliseconds; `None` if the circuit never opened.
    pub opened_at_ms: Option<u64>,
    pub total_requests: u64,
    pub probe_in_flight: bool,
    pub in_warmup: bool,
}

/// Tracks success/latency EWMAs and circuit state for every endpoint.
#[derive(Debug)]
pub struct HealthTracker {
    entries: DashMap<String, Arc<EndpointHealth>>,
    registry: Arc<EndpointRegistry>,
    clock: Arc<dyn Clock>,
    alpha: f64,
    latency_reference_ms: f64,
}

impl HealthTracker {
    pub fn new(registry: Arc<EndpointRegistry>, clock: Arc<dyn Clock>, settings: &PoolSettings) -> Self {
        Self {
            entries: DashMap::new(),
            registry,
            clock,
            alpha: settings.ewma_alpha,
            latency_reference_ms: settings.latency_reference_ms,
        }
    }

    /// Start tracking a freshly registered endpoint (state CLOSED).
    pub fn track(&self, endpoint_id: &str, warmup_requests: u64) {
        self.entries
            .insert(endpoint_id.to_string(), Arc::new(EndpointHealth::new(warmup_requests)));
    }

    pub fn untrack(&self, endpoint_id: &str) {
        self.entries.remove(endpoint_id);
    }

    fn entry(&self, endpoint_id: &str) -> Option<Arc<EndpointHealth>> {
        self.entries.get(endpoint_id).map(|e| e.value().clone())
    }

    /// Fold one outcome into the endpoint's health.
    ///
    /// Unknown endpoints are ignored with a warning; outcomes legitimately
    /// race with deregistration.
    pub fn report_outcome(&self, endpoint_id: &str, success: bool, latency_ms: Option<f64>) -> Option<CircuitTransition> {
        let (Some(entry), Ok(endpoint)) = (self.entry(endpoint_id), self.registry.get(endpoint_id)) else {
            tracing::warn!(endpoint = %endpoint_id, success, "Outcome reported for unknown endpoint, dropping");
            return None;
        };

        let now = self.clock.now_ms();
        let mut stats = entry.stats.lock().unwrap_or_else(PoisonError::into_inner);

        stats.success.observe(if success { 1.0 } else { 0.0 }, self.alpha);
        if let Some(latency) = latency_ms {
            stats.latency.observe(latency.max(0.0), self.alpha);
        }
        stats.total_requests += 1;
        if success {
            stats.consecutive_successes += 1;
            stats.consecutive_failures = 0;
        } else {
            stats.consecutive_failures += 1;
            stats.consecutive_successes = 0;
        }

        let transition = match entry.circuit.load() {
            CircuitState::Closed
                if !success && stats.consecutive_failures >= u64::from(endpoint.failure_threshold) =>
            {
                entry.open(CircuitState::Closed, now).then_some(CircuitTransition::Opened)
            }
            CircuitState::HalfOpen if !success => {
                entry.open(CircuitState::HalfOpen, now).then_some(CircuitTransition::Reopened)
            }
            CircuitState::HalfOpen
                if success && stats.consecutive_successes >= u64::from(endpoint.recovery_threshold) =>
            {
                let closed = entry.circuit.transition(CircuitState::HalfOpen, CircuitState::Closed);
                if closed {
                    stats.trusted_after = stats.total_requests + endpoint.warmup_requests;
                }
                closed.then_some(CircuitTransition::Recovered)
            }
            _ => None,
        };
        let failures = stats.consecutive_failures;
        drop(stats);

        if let Some(t) = transition {
            match t {
                CircuitTransition::Recovered => {
                    tracing::info!(endpoint = %endpoint_id, "Circuit closed, endpoint recovered");
                }
                _ => {
                    tracing::warn!(
                        endpoint = %endpoint_id,
                        consecutive_failures = failures,
                        cooldown_secs = endpoint.cooldown_seconds,
                        transition = ?t,
                        "Circuit opened"
                    );
                }
            }
            metrics::record_circuit_transition(endpoint_id, t.target());
        }
        transition
    }

    /// Whether the endpoint could be routed to right now.
    ///
    /// Does not claim the probe slot; see [`HealthTracker::try_admit`].
    pub fn is_eligible(&self, endpoint_id: &str) -> bool {
        let (Some(entry), Ok(endpoint)) = (self.entry(endpoint_id), self.registry.get(endpoint_id)) else {
            return false;
        };
        let probe_free = !entry.probe_in_flight.load(Ordering::Acquire);

        match entry.circuit.load() {
            CircuitState::Closed => true,
            CircuitState::Open => probe_free && entry.cooldown_elapsed(self.clock.now_ms(), endpoint.cooldown_ms()),
            CircuitState::HalfOpen => probe_free,
        }
    }

    /// Claim the right to route one request to the endpoint.
    ///
    /// From OPEN (past cooldown) or HALF_OPEN, at most one caller at a time is
    /// granted [`Admission::Probe`]; the slot is held until
    /// [`HealthTracker::end_probe`].
    pub fn try_admit(&self, endpoint_id: &str) -> Admission {
        let (Some(entry), Ok(endpoint)) = (self.entry(endpoint_id), self.registry.get(endpoint_id)) else {
            return Admission::Denied;
        };

        match entry.circuit.load() {
            CircuitState::Closed => Admission::Regular,
            CircuitState::Open => {
                if !entry.cooldown_elapsed(self.clock.now_ms(), endpoint.cooldown_ms()) {
                    return Admission::Denied;
                }
                if !claim_probe(&entry) {
                    return Admission::Denied;
                }
                if entry.begin_half_open() {
                    tracing::info!(endpoint = %endpoint_id, "Cooldown elapsed, admitting probe");
                    metrics::record_circuit_transition(endpoint_id, CircuitState::HalfOpen);
                    Admission::Probe
                } else {
                    entry.probe_in_flight.store(false, Ordering::Release);
                    Admission::Denied
                }
            }
            CircuitState::HalfOpen => {
                if !claim_probe(&entry) {
                    return Admission::Denied;
                }
                // A failure may have reopened the circuit since we looked.
                if entry.circuit.load() == CircuitState::HalfOpen {
                    Admission::Probe
                } else {
                    entry.probe_in_flight.store(false, Ordering::Release);
                    Admission::Denied
                }
            }
        }
    }

    /// Free the probe slot (probe lease released, expired, or never issued).
    pub fn end_probe(&self, endpoint_id: &str) {
        if let Some(entry) = self.entry(endpoint_id) {
            entry.probe_in_flight.store(false, Ordering::Release);
        }
    }

    /// Ranking value: `success_ewma / (1 + latency_ewma / latency_reference)`.
    ///
    /// Returns [`NEUTRAL_SCORE`] during warmup and 0.0 for unknown endpoints.
    pub fn score(&self, endpoint_id: &str) -> f64 {
        let Some(entry) = self.entry(endpoint_id) else {
            return 0.0;
        };
        let stats = entry.stats.lock().unwrap_or_else(PoisonError::into_inner);
        self.score_of(&stats)
    }

    fn score_of(&self, stats: &HealthStats) -> f64 {
        if stats.total_requests < stats.trusted_after {
            return NEUTRAL_SCORE;
        }
        stats.success.get() / (1.0 + stats.latency.get() / self.latency_reference_ms)
    }

    pub fn circuit_state(&self, endpoint_id: &str) -> Option<CircuitState> {
        self.entry(endpoint_id).map(|e| e.circuit.load())
    }

    /// Copy of the endpoint's health plus its current score.
    pub fn state(&self, endpoint_id: &str) -> Option<(HealthState, f64)> {
        let entry = self.entry(endpoint_id)?;
        let stats = entry.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let opened_at = entry.opened_at_ms.load(Ordering::Acquire);

        let state = HealthState {
            success_ewma: stats.success.get(),
            latency_ewma: stats.latency.get(),
            consecutive_failures: stats.consecutive_failures,
            consecutive_successes: stats.consecutive_successes,
            circuit_state: entry.circuit.load(),
            opened_at_ms: (opened_at != 0).then_some(opened_at),
            total_requests: stats.total_requests,
            probe_in_flight: entry.probe_in_flight.load(Ordering::Acquire),
            in_warmup: stats.total_requests < stats.trusted_after,
        };
        Some((state, self.score_of(&stats)))
    }
}

fn claim_probe(entry: &EndpointHealth) -> bool {
    entry
        .probe_in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}
