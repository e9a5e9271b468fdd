//! Dynamic proxy pool facade.
//!
//! # Data Flow
//! ```text
//! acquire(client_id?)
//!     → registry.list()             (snapshot of endpoints)
//!     → health.is_eligible          (CLOSED, or probe-ready)   → none: NoEligibleEndpoint
//!     → leases.has_capacity         (under max sessions)       → none: PoolExhausted
//!     → leases.lookup_sticky        (client affinity hint)
//!     → strategy.select             (weighted by health score)
//!     → health.try_admit + leases.try_reserve (retry on a lost race)
//!     → leases.create_lease
//!
//! release(lease, outcome, latency?)
//!     → health.report_outcome (skipped for Unknown)
//!     → free probe slot, then capacity
//! ```
//!
//! # Design Decisions
//! - The pool is an explicit instance; nothing here is process-global
//! - acquire never waits for capacity and never retries on the caller's behalf
//! - No lock spans more than one endpoint

pub mod credentials;
pub mod snapshot;
pub mod sweeper;

pub use credentials::{ConnectionDetails, CredentialResolver, EnvCredentialResolver, NoCredentials};
pub use snapshot::{EndpointSnapshot, ReconcileReport, SweepReport};
pub use sweeper::LeaseSweeper;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{PoolConfig, PoolSettings};
use crate::error::PoolError;
use crate::health::{Admission, CircuitState, CircuitTransition, HealthState, HealthTracker};
use crate::lease::{Lease, LeaseManager, LeaseOutcome};
use crate::observability::metrics;
use crate::registry::{EndpointRegistry, ProxyEndpoint};
use crate::selection::{self, SelectionStrategy};

/// Builder for [`DynamicProxyPool`].
#[derive(Debug)]
pub struct PoolBuilder {
    settings: PoolSettings,
    clock: Option<Arc<dyn Clock>>,
    strategy: Option<Box<dyn SelectionStrategy>>,
    credentials: Option<Arc<dyn CredentialResolver>>,
}

impl PoolBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> DynamicProxyPool {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let strategy = self.strategy.unwrap_or_else(|| selection::from_settings(&self.settings));
        let credentials = self.credentials.unwrap_or_else(|| Arc::new(NoCredentials));

        let registry = Arc::new(EndpointRegistry::new());
        let health = Arc::new(HealthTracker::new(registry.clone(), clock.clone(), &self.settings));
        let leases = LeaseManager::new(health.clone(), clock.clone(), self.settings.sticky_ttl_ms());

        DynamicProxyPool {
            settings: self.settings,
            registry,
            health,
            leases,
            strategy,
            credentials,
        }
    }
}

/// Health-aware endpoint pool.
#[derive(Debug)]
pub struct DynamicProxyPool {
    settings: PoolSettings,
    registry: Arc<EndpointRegistry>,
    health: Arc<HealthTracker>,
    leases: LeaseManager,
    strategy: Box<dyn SelectionStrategy>,
    credentials: Arc<dyn CredentialResolver>,
}

impl DynamicProxyPool {
    /// Pool on the system clock with the configured strategy.
    pub fn new(settings: PoolSettings) -> Self {
        Self::builder(settings).build()
    }

    pub fn builder(settings: PoolSettings) -> PoolBuilder {
        PoolBuilder {
            settings,
            clock: None,
            strategy: None,
            credentials: None,
        }
    }

    /// Build a pool and register every configured endpoint.
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let pool = Self::new(config.pool.clone());
        for endpoint in &config.endpoints {
            pool.register_endpoint(endpoint.clone())?;
        }
        Ok(pool)
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    // --- Administration ---

    /// Add an endpoint. It starts CLOSED with no leases.
    pub fn register_endpoint(&self, endpoint: ProxyEndpoint) -> Result<(), PoolError> {
        let endpoint = self.registry.register_with(endpoint, |e| {
            self.health.track(&e.id, e.warmup_requests);
            self.leases.add_endpoint(&e.id);
        })?;

        tracing::info!(
            endpoint = %endpoint.id,
            address = %endpoint.address,
            region = ?endpoint.region,
            weight = endpoint.weight,
            max_sessions = endpoint.max_concurrent_sessions,
            "Endpoint registered"
        );
        Ok(())
    }

    /// Replace an endpoint's descriptor, keeping its health and leases.
    pub fn update_endpoint(&self, endpoint: ProxyEndpoint) -> Result<(), PoolError> {
        let id = endpoint.id.clone();
        let previous = self.registry.update(endpoint)?;
        tracing::info!(endpoint = %id, previous_address = %previous.address, "Endpoint updated");
        Ok(())
    }

    /// Remove an endpoint with no outstanding leases.
    pub fn deregister_endpoint(&self, endpoint_id: &str) -> Result<(), PoolError> {
        self.registry.deregister(endpoint_id, |id| {
            self.leases
                .close_slot(id)
                .map_err(|active_leases| PoolError::InUse {
                    id: id.to_string(),
                    active_leases,
                })?;
            self.health.untrack(id);
            self.leases.remove_endpoint(id);
            self.strategy.forget(id);
            Ok(())
        })?;

        tracing::info!(endpoint = %endpoint_id, "Endpoint deregistered");
        Ok(())
    }

    /// Expire all of an endpoint's leases without recording outcomes.
    pub fn force_expire(&self, endpoint_id: &str) -> Result<usize, PoolError> {
        self.registry.get(endpoint_id)?;
        let expired = self.leases.force_expire(endpoint_id).len();
        if expired > 0 {
            tracing::info!(endpoint = %endpoint_id, expired, "Force-expired leases");
            metrics::record_leases_expired(expired);
        }
        Ok(expired)
    }

    /// Bring the endpoint set in line with `endpoints`.
    ///
    /// Endpoints still holding leases are kept and reported as retained.
    pub fn reconcile(&self, endpoints: &[ProxyEndpoint]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let wanted: HashSet<&str> = endpoints.iter().map(|e| e.id.as_str()).collect();

        for endpoint in endpoints {
            let (result, bucket) = match self.registry.get(&endpoint.id) {
                Ok(current) if *current == *endpoint => continue,
                Ok(_) => (self.update_endpoint(endpoint.clone()), &mut report.updated),
                Err(_) => (self.register_endpoint(endpoint.clone()), &mut report.added),
            };
            match result {
                Ok(()) => bucket.push(endpoint.id.clone()),
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint.id, error = %e, "Rejected endpoint during reload");
                    report.rejected.push(endpoint.id.clone());
                }
            }
        }

        let stale: Vec<String> = self
            .registry
            .list()
            .iter()
            .filter(|e| !wanted.contains(e.id.as_str()))
            .map(|e| e.id.clone())
            .collect();
        for id in stale {
            match self.deregister_endpoint(&id) {
                Ok(()) => report.removed.push(id),
                Err(PoolError::InUse { active_leases, .. }) => {
                    tracing::warn!(endpoint = %id, active_leases, "Endpoint removed from config but still leased, keeping");
                    report.retained.push(id);
                }
                Err(e) => tracing::debug!(endpoint = %id, error = %e, "Endpoint already gone"),
            }
        }
        report
    }

    // --- Traffic ---

    /// Lease an endpoint for one unit of work.
    pub fn acquire(&self, client_id: Option<&str>) -> Result<Lease, PoolError> {
        let result = self.try_acquire(client_id);
        match &result {
            Ok(lease) => metrics::record_acquire(if lease.probe { "probe" } else { "ok" }),
            Err(e) => {
                tracing::debug!(client_id = ?client_id, error = %e, "Acquire failed");
                metrics::record_acquire(e.kind());
            }
        }
        result
    }

    fn try_acquire(&self, client_id: Option<&str>) -> Result<Lease, PoolError> {
        let endpoints = self.registry.list();
        let eligible: Vec<Arc<ProxyEndpoint>> = endpoints
            .iter()
            .filter(|e| self.health.is_eligible(&e.id))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(PoolError::NoEligibleEndpoint);
        }

        let mut candidates: Vec<Arc<ProxyEndpoint>> = eligible
            .into_iter()
            .filter(|e| self.leases.has_capacity(e))
            .collect();
        if candidates.is_empty() {
            return Err(PoolError::PoolExhausted);
        }

        let sticky_hint = client_id.and_then(|c| self.leases.lookup_sticky(c));
        let scores: HashMap<String, f64> = candidates
            .iter()
            .map(|e| (e.id.clone(), self.health.score(&e.id)))
            .collect();

        let mut lost_capacity = false;
        while !candidates.is_empty() {
            let chosen = self.strategy.select(&candidates, &scores, sticky_hint.as_deref())?;
            let Some(pos) = candidates.iter().position(|e| e.id == chosen) else {
                break;
            };
            let endpoint = candidates.swap_remove(pos);

            let admission = self.health.try_admit(&endpoint.id);
            if admission == Admission::Denied {
                continue;
            }
            if !self.leases.try_reserve(&endpoint) {
                if admission == Admission::Probe {
                    self.health.end_probe(&endpoint.id);
                }
                lost_capacity = true;
                continue;
            }

            let probe = admission == Admission::Probe;
            let lease = self
                .leases
                .create_lease(&endpoint, client_id, self.settings.lease_ttl_ms(), probe);
            self.strategy.commit(&endpoint.id);
            return Ok(lease);
        }

        Err(if lost_capacity {
            PoolError::PoolExhausted
        } else {
            PoolError::NoEligibleEndpoint
        })
    }

    /// Return a lease with what the caller observed.
    ///
    /// Returns false if the lease was already released or expired.
    pub fn release(&self, lease: &Lease, outcome: LeaseOutcome, latency_ms: Option<f64>) -> bool {
        match self.leases.release(lease.lease_id, outcome, latency_ms) {
            Some(released) => {
                metrics::record_release(outcome.as_str());
                self.on_transition(&released.lease.endpoint_id, released.transition);
                true
            }
            None => {
                tracing::debug!(lease_id = %lease.lease_id, "Release of unknown or expired lease ignored");
                false
            }
        }
    }

    /// Feed an outcome observed outside a lease.
    pub fn report_outcome(&self, endpoint_id: &str, success: bool, latency_ms: Option<f64>) {
        let transition = self.health.report_outcome(endpoint_id, success, latency_ms);
        self.on_transition(endpoint_id, transition);
    }

    fn on_transition(&self, endpoint_id: &str, transition: Option<CircuitTransition>) {
        if transition.is_some_and(|t| t.is_opening()) {
            let evicted = self.leases.evict_sticky(endpoint_id);
            if evicted > 0 {
                tracing::debug!(endpoint = %endpoint_id, evicted, "Evicted sticky bindings of opened endpoint");
            }
        }
    }

    /// Reclaim expired leases and idle sticky bindings.
    pub fn sweep_expired(&self) -> SweepReport {
        let expired_leases = self.leases.sweep_expired().len();
        let pruned_bindings = self.leases.prune_sticky();
        if expired_leases > 0 {
            metrics::record_leases_expired(expired_leases);
        }
        SweepReport {
            expired_leases,
            pruned_bindings,
        }
    }

    /// Address and authorization for a leased endpoint.
    pub fn connection_details(&self, lease: &Lease) -> ConnectionDetails {
        ConnectionDetails {
            endpoint_id: lease.endpoint_id.clone(),
            address: lease.address.clone(),
            authorization: self.credentials.resolve(&lease.endpoint_id),
        }
    }

    // --- Read model ---

    pub fn is_eligible(&self, endpoint_id: &str) -> bool {
        self.health.is_eligible(endpoint_id)
    }

    pub fn circuit_state(&self, endpoint_id: &str) -> Option<CircuitState> {
        self.health.circuit_state(endpoint_id)
    }

    pub fn health_of(&self, endpoint_id: &str) -> Option<HealthState> {
        self.health.state(endpoint_id).map(|(state, _)| state)
    }

    pub fn active_leases(&self, endpoint_id: &str) -> usize {
        self.leases.active_leases(endpoint_id)
    }

    pub fn outstanding_leases(&self) -> usize {
        self.leases.outstanding()
    }

    pub fn sticky_bindings(&self) -> usize {
        self.leases.sticky_bindings()
    }

    /// Per-endpoint telemetry. Each row holds one endpoint's lock briefly.
    pub fn snapshot(&self) -> Vec<EndpointSnapshot> {
        let mut rows = Vec::new();
        for endpoint in &self.registry.list() {
            let Some((health, score)) = self.health.state(&endpoint.id) else {
                continue;
            };
            let row = EndpointSnapshot {
                id: endpoint.id.clone(),
                address: endpoint.address.clone(),
                region: endpoint.region.clone(),
                weight: endpoint.weight,
                max_concurrent_sessions: endpoint.max_concurrent_sessions,
                circuit_state: health.circuit_state,
                success_ewma: health.success_ewma,
                latency_ewma: health.latency_ewma,
                consecutive_failures: health.consecutive_failures,
                consecutive_successes: health.consecutive_successes,
                total_requests: health.total_requests,
                active_leases: self.leases.active_leases(&endpoint.id),
                probe_in_flight: health.probe_in_flight,
                in_warmup: health.in_warmup,
                score,
            };
            metrics::record_endpoint(&row);
            rows.push(row);
        }
        rows
    }
}
