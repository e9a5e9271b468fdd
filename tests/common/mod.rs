//! Shared helpers for pool integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use endpoint_pool::{DynamicProxyPool, Lease, LeaseOutcome, ManualClock, PoolSettings, ProxyEndpoint};

/// Pool on a manual clock with default settings.
pub fn manual_pool() -> (Arc<DynamicProxyPool>, Arc<ManualClock>) {
    manual_pool_with(PoolSettings::default())
}

pub fn manual_pool_with(settings: PoolSettings) -> (Arc<DynamicProxyPool>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let pool = DynamicProxyPool::builder(settings).clock(clock.clone()).build();
    (Arc::new(pool), clock)
}

pub fn register(pool: &DynamicProxyPool, endpoints: Vec<ProxyEndpoint>) {
    for endpoint in endpoints {
        pool.register_endpoint(endpoint).unwrap();
    }
}

/// Acquire and immediately fail `n` leases against the only eligible endpoint.
pub fn fail_times(pool: &DynamicProxyPool, n: usize) {
    for _ in 0..n {
        let lease = pool.acquire(None).unwrap();
        pool.release(&lease, LeaseOutcome::Failure, Some(50.0));
    }
}

pub fn succeed(pool: &DynamicProxyPool, lease: &Lease) -> bool {
    pool.release(lease, LeaseOutcome::Success, Some(20.0))
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
