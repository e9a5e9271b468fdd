//! Endpoint registry.
//!
//! # Responsibilities
//! - Hold the configured descriptor of every endpoint
//! - Reject duplicate ids and invalid descriptors at registration
//! - Serve consistent snapshots of the endpoint set
//!
//! # Design Decisions
//! - Copy-on-write map behind `ArcSwap`: reads never block, writers
//!   serialize on a small mutex and publish a new map
//! - A `list()` snapshot is ordered by id and unaffected by later writes
//! - Per-endpoint setup and teardown hooks run under the write lock, so a
//!   register and a deregister of the same id never interleave their state

pub mod endpoint;

pub use endpoint::ProxyEndpoint;

use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PoolError;

type EndpointMap = BTreeMap<String, Arc<ProxyEndpoint>>;

/// Registry of configured endpoints.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: ArcSwap<EndpointMap>,
    write_lock: Mutex<()>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new endpoint.
    pub fn register(&self, endpoint: ProxyEndpoint) -> Result<Arc<ProxyEndpoint>, PoolError> {
        self.register_with(endpoint, |_| {})
    }

    /// Insert a new endpoint, running `on_insert` under the write lock just
    /// before the endpoint becomes visible to readers.
    pub fn register_with<F>(&self, endpoint: ProxyEndpoint, on_insert: F) -> Result<Arc<ProxyEndpoint>, PoolError>
    where
        F: FnOnce(&ProxyEndpoint),
    {
        endpoint.validate()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.endpoints.load();
        if current.contains_key(&endpoint.id) {
            return Err(PoolError::DuplicateId(endpoint.id));
        }

        on_insert(&endpoint);
        let endpoint = Arc::new(endpoint);
        let mut next = EndpointMap::clone(&current);
        next.insert(endpoint.id.clone(), endpoint.clone());
        self.endpoints.store(Arc::new(next));
        Ok(endpoint)
    }

    /// Replace the descriptor of an existing endpoint.
    ///
    /// Returns the previous descriptor.
    pub fn update(&self, endpoint: ProxyEndpoint) -> Result<Arc<ProxyEndpoint>, PoolError> {
        endpoint.validate()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.endpoints.load();
        let previous = current
            .get(&endpoint.id)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(endpoint.id.clone()))?;

        let mut next = EndpointMap::clone(&current);
        next.insert(endpoint.id.clone(), Arc::new(endpoint));
        self.endpoints.store(Arc::new(next));
        Ok(previous)
    }

    /// Remove an endpoint.
    ///
    /// `teardown` runs while the write lock is held; an error from it (such as
    /// `InUse`) leaves the endpoint registered.
    pub fn deregister<F>(&self, id: &str, teardown: F) -> Result<Arc<ProxyEndpoint>, PoolError>
    where
        F: FnOnce(&str) -> Result<(), PoolError>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.endpoints.load();
        if !current.contains_key(id) {
            return Err(PoolError::NotFound(id.to_string()));
        }

        teardown(id)?;

        let mut next = EndpointMap::clone(&current);
        let removed = next.remove(id).ok_or_else(|| PoolError::NotFound(id.to_string()))?;
        self.endpoints.store(Arc::new(next));
        Ok(removed)
    }

    /// Look up one endpoint.
    pub fn get(&self, id: &str) -> Result<Arc<ProxyEndpoint>, PoolError> {
        self.endpoints
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.endpoints.load().contains_key(id)
    }

    /// A stable snapshot of every registered endpoint, ordered by id.
    ///
    /// The returned value can be iterated any number of times.
    pub fn list(&self) -> EndpointList {
        EndpointList {
            map: self.endpoints.load_full(),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.load().is_empty()
    }
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone)]
pub struct EndpointList {
    map: Arc<EndpointMap>,
}

impl EndpointList {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProxyEndpoint>> + '_ {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<'a> IntoIterator for &'a EndpointList {
    type Item = &'a Arc<ProxyEndpoint>;
    type IntoIter = std::collections::btree_map::Values<'a, String, Arc<ProxyEndpoint>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = EndpointRegistry::new();
        registry.register(ProxyEndpoint::new("e1", "10.0.0.1:443")).unwrap();

        let ep = registry.get("e1").unwrap();
        assert_eq!(ep.address, "10.0.0.1:443");
        assert!(matches!(registry.get("missing"), Err(PoolError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = EndpointRegistry::new();
        registry.register(ProxyEndpoint::new("e1", "a:1")).unwrap();
        let err = registry.register(ProxyEndpoint::new("e1", "b:1")).unwrap_err();
        assert_eq!(err, PoolError::DuplicateId("e1".into()));
        assert_eq!(registry.get("e1").unwrap().address, "a:1");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let registry = EndpointRegistry::new();
        let err = registry
            .register(ProxyEndpoint::new("e1", "a:1").with_weight(0.0))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidEndpoint(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deregister_in_use_and_missing() {
        let registry = EndpointRegistry::new();
        registry.register(ProxyEndpoint::new("e1", "a:1")).unwrap();

        let in_use = |id: &str| -> Result<(), PoolError> {
            Err(PoolError::InUse {
                id: id.to_string(),
                active_leases: 2,
            })
        };
        let err = registry.deregister("e1", in_use).unwrap_err();
        assert_eq!(err, PoolError::InUse { id: "e1".into(), active_leases: 2 });
        assert!(registry.contains("e1"));

        registry.deregister("e1", |_| Ok(())).unwrap();
        assert!(!registry.contains("e1"));
        assert!(matches!(registry.deregister("e1", |_| Ok(())), Err(PoolError::NotFound(_))));
    }

    #[test]
    fn test_hooks_skip_rejected_writes() {
        let registry = EndpointRegistry::new();
        let mut inserted = Vec::new();
        registry
            .register_with(ProxyEndpoint::new("e1", "a:1").with_region("eu-west"), |e| {
                inserted.push(e.id.clone())
            })
            .unwrap();
        assert!(registry
            .register_with(ProxyEndpoint::new("e1", "b:1"), |e| inserted.push(e.id.clone()))
            .is_err());
        assert_eq!(inserted, vec!["e1".to_string()]);
        assert_eq!(registry.get("e1").unwrap().region.as_deref(), Some("eu-west"));

        let mut torn_down = false;
        assert!(registry
            .deregister("ghost", |_| {
                torn_down = true;
                Ok(())
            })
            .is_err());
        assert!(!torn_down);
    }

    #[test]
    fn test_list_snapshot_is_stable() {
        let registry = EndpointRegistry::new();
        registry.register(ProxyEndpoint::new("b", "b:1")).unwrap();
        registry.register(ProxyEndpoint::new("a", "a:1")).unwrap();

        let snapshot = registry.list();
        registry.register(ProxyEndpoint::new("c", "c:1")).unwrap();

        let ids: Vec<_> = snapshot.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // Restartable.
        assert_eq!(snapshot.iter().count(), 2);
        assert_eq!(registry.list().len(), 3);
    }

    #[test]
    fn test_update_replaces_descriptor() {
        let registry = EndpointRegistry::new();
        registry.register(ProxyEndpoint::new("e1", "a:1")).unwrap();

        let old = registry.update(ProxyEndpoint::new("e1", "a:1").with_weight(5.0)).unwrap();
        assert_eq!(old.weight, 1.0);
        assert_eq!(registry.get("e1").unwrap().weight, 5.0);
        assert!(registry.update(ProxyEndpoint::new("nope", "x:1")).is_err());
    }
}
