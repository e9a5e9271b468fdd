//! Client-to-endpoint affinity.
//!
//! `DashMap` shards bindings by `client_id` hash, so sticky lookups for
//! different clients rarely contend.

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Binding {
    endpoint_id: String,
    last_used_ms: u64,
}

/// Sticky bindings with an idle TTL.
#[derive(Debug)]
pub struct StickyAffinity {
    bindings: DashMap<String, Binding>,
    /// 0 disables idle expiry.
    ttl_ms: u64,
}

impl StickyAffinity {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            bindings: DashMap::new(),
            ttl_ms,
        }
    }

    fn is_idle(&self, binding: &Binding, now_ms: u64) -> bool {
        self.ttl_ms > 0 && now_ms.saturating_sub(binding.last_used_ms) >= self.ttl_ms
    }

    /// Create or refresh a binding.
    pub fn bind(&self, client_id: &str, endpoint_id: &str, now_ms: u64) {
        self.bindings.insert(
            client_id.to_string(),
            Binding {
                endpoint_id: endpoint_id.to_string(),
                last_used_ms: now_ms,
            },
        );
    }

    /// The bound endpoint, if the binding is fresh and `eligible` accepts it.
    ///
    /// Stale bindings are removed.
    pub fn lookup<F>(&self, client_id: &str, now_ms: u64, eligible: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        // Clone out so the shard lock is released before any removal.
        let binding = self.bindings.get(client_id)?.value().clone();

        if !self.is_idle(&binding, now_ms) && eligible(&binding.endpoint_id) {
            return Some(binding.endpoint_id);
        }

        self.bindings.remove_if(client_id, |_, current| {
            current.endpoint_id == binding.endpoint_id && current.last_used_ms == binding.last_used_ms
        });
        tracing::debug!(client_id = %client_id, endpoint = %binding.endpoint_id, "Dropped stale sticky binding");
        None
    }

    /// Drop every binding to an endpoint. Returns how many were removed.
    pub fn evict_endpoint(&self, endpoint_id: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|_, b| b.endpoint_id != endpoint_id);
        before.saturating_sub(self.bindings.len())
    }

    /// Drop bindings idle past the TTL.
    pub fn prune_idle(&self, now_ms: u64) -> usize {
        if self.ttl_ms == 0 {
            return 0;
        }
        let before = self.bindings.len();
        let ttl = self.ttl_ms;
        self.bindings
            .retain(|_, b| now_ms.saturating_sub(b.last_used_ms) < ttl);
        before.saturating_sub(self.bindings.len())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_idle_expiry() {
        let sticky = StickyAffinity::new(1_000);
        sticky.bind("c1", "e1", 10);

        assert_eq!(sticky.lookup("c1", 500, |_| true).as_deref(), Some("e1"));
        assert_eq!(sticky.lookup("c1", 1_010, |_| true), None);
        assert!(sticky.is_empty());
    }

    #[test]
    fn test_ineligible_binding_is_cleared() {
        let sticky = StickyAffinity::new(0);
        sticky.bind("c1", "e1", 10);

        assert_eq!(sticky.lookup("c1", 10, |id| id != "e1"), None);
        assert_eq!(sticky.lookup("c1", 10, |_| true), None);
    }

    #[test]
    fn test_evict_and_prune() {
        let sticky = StickyAffinity::new(100);
        sticky.bind("c1", "e1", 0);
        sticky.bind("c2", "e1", 50);
        sticky.bind("c3", "e2", 90);

        assert_eq!(sticky.evict_endpoint("e1"), 2);
        assert_eq!(sticky.len(), 1);
        assert_eq!(sticky.prune_idle(150), 0);
        assert_eq!(sticky.prune_idle(190), 1);
        assert!(sticky.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_idles() {
        let sticky = StickyAffinity::new(0);
        sticky.bind("c1", "e1", 1);
        assert_eq!(sticky.prune_idle(u64::MAX), 0);
        assert_eq!(sticky.lookup("c1", u64::MAX, |_| true).as_deref(), Some("e1"));
    }
}
