//! Lease issuance, release and expiry.
//!
//! # Responsibilities
//! - Enforce per-endpoint `max_concurrent_sessions` with lock-free slots
//! - Mint lease tokens and record sticky bindings
//! - Release leases exactly once (explicit release or expiry sweep)
//!
//! # Design Decisions
//! - Removing a lease from the map is the claim: whichever of release,
//!   sweep or force-expire removes it frees the capacity; everyone else no-ops
//! - Outcome and probe bookkeeping happen before capacity is freed, so a
//!   caller retrying on the freed slot already sees the new circuit state
//! - Deregistration closes a slot by swapping its count from 0 to
//!   `CLOSED`; a closed slot never hands out capacity again

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::health::{CircuitTransition, HealthTracker};
use crate::lease::sticky::StickyAffinity;
use crate::lease::token::{Lease, LeaseOutcome};
use crate::registry::ProxyEndpoint;

/// Slot value marking an endpoint that is being removed.
const CLOSED: usize = usize::MAX;

/// Result of a successful release.
#[derive(Debug, Clone)]
pub struct Released {
    pub lease: Lease,
    pub transition: Option<CircuitTransition>,
}

/// Tracks outstanding leases and per-endpoint capacity.
#[derive(Debug)]
pub struct LeaseManager {
    leases: DashMap<Uuid, Lease>,
    slots: DashMap<String, Arc<AtomicUsize>>,
    sticky: StickyAffinity,
    health: Arc<HealthTracker>,
    clock: Arc<dyn Clock>,
}

impl LeaseManager {
    pub fn new(health: Arc<HealthTracker>, clock: Arc<dyn Clock>, sticky_ttl_ms: u64) -> Self {
        Self {
            leases: DashMap::new(),
            slots: DashMap::new(),
            sticky: StickyAffinity::new(sticky_ttl_ms),
            health,
            clock,
        }
    }

    /// Open a fresh capacity slot for a newly registered endpoint.
    pub fn add_endpoint(&self, endpoint_id: &str) {
        self.slots
            .insert(endpoint_id.to_string(), Arc::new(AtomicUsize::new(0)));
    }

    /// Close an endpoint's slot so no further reservation can succeed.
    ///
    /// Fails with the outstanding count if any capacity is held. A missing
    /// slot counts as closed.
    pub fn close_slot(&self, endpoint_id: &str) -> Result<(), usize> {
        let Some(slot) = self.slot(endpoint_id) else {
            return Ok(());
        };
        match slot.compare_exchange(0, CLOSED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) | Err(CLOSED) => Ok(()),
            Err(active) => Err(active),
        }
    }

    /// Forget a deregistered endpoint's slot and sticky bindings.
    pub fn remove_endpoint(&self, endpoint_id: &str) {
        self.slots.remove(endpoint_id);
        self.sticky.evict_endpoint(endpoint_id);
    }

    fn slot(&self, endpoint_id: &str) -> Option<Arc<AtomicUsize>> {
        self.slots.get(endpoint_id).map(|s| s.value().clone())
    }

    /// Outstanding leases against an endpoint.
    pub fn active_leases(&self, endpoint_id: &str) -> usize {
        self.slot(endpoint_id)
            .map(|s| s.load(Ordering::Acquire))
            .filter(|&n| n != CLOSED)
            .unwrap_or(0)
    }

    /// Outstanding leases across the pool.
    pub fn outstanding(&self) -> usize {
        self.leases.len()
    }

    /// Whether a reservation would currently succeed. Advisory only.
    pub fn has_capacity(&self, endpoint: &ProxyEndpoint) -> bool {
        match self.slot(&endpoint.id) {
            Some(slot) => match slot.load(Ordering::Acquire) {
                CLOSED => false,
                n => !endpoint.is_capped() || n < endpoint.max_concurrent_sessions,
            },
            None => false,
        }
    }

    /// Atomically take one unit of capacity.
    pub fn try_reserve(&self, endpoint: &ProxyEndpoint) -> bool {
        let Some(slot) = self.slot(&endpoint.id) else {
            return false;
        };
        let limit = if endpoint.is_capped() {
            endpoint.max_concurrent_sessions
        } else {
            CLOSED - 1
        };

        let mut prev = slot.load(Ordering::Acquire);
        loop {
            if prev == CLOSED || prev >= limit {
                return false;
            }
            match slot.compare_exchange_weak(prev, prev + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(x) => prev = x,
            }
        }
    }

    fn unreserve(&self, endpoint_id: &str) {
        if let Some(slot) = self.slot(endpoint_id) {
            let _ = slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                CLOSED => None,
                n => n.checked_sub(1),
            });
        }
    }

    /// Mint a lease. The caller must already hold a reservation.
    pub fn create_lease(&self, endpoint: &ProxyEndpoint, client_id: Option<&str>, ttl_ms: u64, probe: bool) -> Lease {
        let now = self.clock.now_ms();
        let lease = Lease {
            lease_id: Uuid::new_v4(),
            endpoint_id: endpoint.id.clone(),
            address: endpoint.address.clone(),
            client_id: client_id.map(str::to_string),
            issued_at_ms: now,
            expires_at_ms: now.saturating_add(ttl_ms),
            probe,
        };

        if let Some(client) = client_id {
            self.sticky.bind(client, &endpoint.id, now);
        }
        self.leases.insert(lease.lease_id, lease.clone());

        tracing::debug!(
            lease_id = %lease.lease_id,
            endpoint = %lease.endpoint_id,
            client_id = ?lease.client_id,
            probe,
            "Lease issued"
        );
        lease
    }

    /// Release a lease, recording its outcome.
    ///
    /// Returns `None` if the lease was already released or swept.
    pub fn release(&self, lease_id: Uuid, outcome: LeaseOutcome, latency_ms: Option<f64>) -> Option<Released> {
        let (_, lease) = self.leases.remove(&lease_id)?;

        let transition = outcome
            .as_success()
            .and_then(|success| self.health.report_outcome(&lease.endpoint_id, success, latency_ms));
        if lease.probe {
            self.health.end_probe(&lease.endpoint_id);
        }
        self.unreserve(&lease.endpoint_id);

        tracing::debug!(
            lease_id = %lease.lease_id,
            endpoint = %lease.endpoint_id,
            outcome = outcome.as_str(),
            "Lease released"
        );
        Some(Released { lease, transition })
    }

    /// Reclaim every lease for which `pred` holds, without recording an outcome.
    fn reclaim<F>(&self, pred: F) -> Vec<Lease>
    where
        F: Fn(&Lease) -> bool,
    {
        let ids: Vec<Uuid> = self
            .leases
            .iter()
            .filter(|l| pred(l.value()))
            .map(|l| *l.key())
            .collect();

        let mut reclaimed = Vec::with_capacity(ids.len());
        for id in ids {
            // Re-check under the shard lock; a concurrent release may have won.
            if let Some((_, lease)) = self.leases.remove_if(&id, |_, l| pred(l)) {
                if lease.probe {
                    self.health.end_probe(&lease.endpoint_id);
                }
                self.unreserve(&lease.endpoint_id);
                reclaimed.push(lease);
            }
        }
        reclaimed
    }

    /// Free capacity held by leases past `expires_at`.
    ///
    /// Expiry is neutral: it never counts as a success or failure.
    pub fn sweep_expired(&self) -> Vec<Lease> {
        let now = self.clock.now_ms();
        let expired = self.reclaim(|l| l.is_expired(now));
        for lease in &expired {
            tracing::debug!(
                lease_id = %lease.lease_id,
                endpoint = %lease.endpoint_id,
                "Lease expired, capacity reclaimed"
            );
        }
        expired
    }

    /// Expire every outstanding lease of one endpoint (neutral outcome).
    pub fn force_expire(&self, endpoint_id: &str) -> Vec<Lease> {
        self.reclaim(|l| l.endpoint_id == endpoint_id)
    }

    /// Sticky endpoint for a client, if still bound and eligible.
    pub fn lookup_sticky(&self, client_id: &str) -> Option<String> {
        self.sticky
            .lookup(client_id, self.clock.now_ms(), |id| self.health.is_eligible(id))
    }

    /// Drop sticky bindings to an endpoint whose circuit opened.
    pub fn evict_sticky(&self, endpoint_id: &str) -> usize {
        self.sticky.evict_endpoint(endpoint_id)
    }

    /// Drop sticky bindings idle past their TTL.
    pub fn prune_sticky(&self) -> usize {
        self.sticky.prune_idle(self.clock.now_ms())
    }

    pub fn sticky_bindings(&self) -> usize {
        self.sticky.len()
    }
}
