//! End-to-end pool behaviour on a manual clock.

use std::collections::HashMap;

use endpoint_pool::{CircuitState, LeaseOutcome, PoolError, PoolSettings, ProxyEndpoint, SweepReport};

mod common;
use common::*;

#[test]
fn test_circuit_round_trip() {
    let (pool, clock) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "10.0.0.1:443").with_circuit(3, 2, 10)]);

    fail_times(&pool, 2);
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Closed));
    fail_times(&pool, 1);
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Open));
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));

    clock.advance(secs(9));
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));
    clock.advance(secs(1));

    // First probe.
    let probe = pool.acquire(None).unwrap();
    assert!(probe.probe);
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::HalfOpen));
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));
    assert!(succeed(&pool, &probe));
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::HalfOpen));

    // Second probe closes the circuit.
    let probe = pool.acquire(None).unwrap();
    assert!(probe.probe);
    assert!(succeed(&pool, &probe));
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Closed));

    let regular = pool.acquire(None).unwrap();
    assert!(!regular.probe);
    let health = pool.health_of("e1").unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.total_requests, 5);
}

#[test]
fn test_failed_probe_reopens() {
    let (pool, clock) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_circuit(1, 1, 10)]);

    fail_times(&pool, 1);
    clock.advance(secs(10));
    let probe = pool.acquire(None).unwrap();
    assert!(probe.probe);
    pool.release(&probe, LeaseOutcome::Failure, None);

    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Open));
    let health = pool.health_of("e1").unwrap();
    assert!(!health.probe_in_flight);
    assert_eq!(health.opened_at_ms, Some(clock_ms(&clock)));

    // Cooldown restarts from the reopen.
    clock.advance(secs(5));
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));
    clock.advance(secs(5));
    assert!(pool.acquire(None).unwrap().probe);
}

#[test]
fn test_late_success_does_not_shorten_recovery() {
    let (pool, clock) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_circuit(1, 2, 10)]);

    let first = pool.acquire(None).unwrap();
    let second = pool.acquire(None).unwrap();
    pool.release(&first, LeaseOutcome::Failure, None);
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Open));
    // Issued before the circuit opened; lands while it is open.
    assert!(succeed(&pool, &second));

    clock.advance(secs(10));
    let trial = pool.acquire(None).unwrap();
    assert!(trial.probe);
    assert!(succeed(&pool, &trial));
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::HalfOpen));

    let trial = pool.acquire(None).unwrap();
    assert!(trial.probe);
    assert!(succeed(&pool, &trial));
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Closed));
}

fn clock_ms(clock: &endpoint_pool::ManualClock) -> u64 {
    use endpoint_pool::Clock;
    clock.now_ms()
}

#[test]
fn test_open_endpoint_skipped_for_healthy_one() {
    let (pool, _) = manual_pool();
    register(
        &pool,
        vec![
            ProxyEndpoint::new("bad", "b:1").with_circuit(1, 1, 60),
            ProxyEndpoint::new("good", "g:1"),
        ],
    );
    pool.report_outcome("bad", false, None);

    for _ in 0..50 {
        let lease = pool.acquire(None).unwrap();
        assert_eq!(lease.endpoint_id, "good");
        pool.release(&lease, LeaseOutcome::Unknown, None);
    }
}

#[test]
fn test_capacity_exhaustion() {
    let (pool, _) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_max_sessions(2)]);

    let a = pool.acquire(None).unwrap();
    let _b = pool.acquire(None).unwrap();
    let err = pool.acquire(None).unwrap_err();
    assert_eq!(err, PoolError::PoolExhausted);
    assert!(err.is_retryable());

    pool.release(&a, LeaseOutcome::Success, None);
    assert!(pool.acquire(None).is_ok());
}

#[test]
fn test_no_eligible_beats_exhausted() {
    let (pool, _) = manual_pool();
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));

    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_circuit(1, 1, 60).with_max_sessions(1)]);
    pool.report_outcome("e1", false, None);
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));
}

#[test]
fn test_weighted_distribution() {
    let (pool, _) = manual_pool();
    register(
        &pool,
        vec![
            ProxyEndpoint::new("heavy", "h:1").with_weight(3.0),
            ProxyEndpoint::new("light", "l:1").with_weight(1.0),
        ],
    );

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..10_000 {
        let lease = pool.acquire(None).unwrap();
        *counts.entry(lease.endpoint_id.clone()).or_default() += 1;
        pool.release(&lease, LeaseOutcome::Unknown, None);
    }

    let ratio = counts["heavy"] as f64 / counts["light"] as f64;
    assert!((2.6..3.4).contains(&ratio), "ratio was {ratio}");
    assert_eq!(pool.health_of("heavy").unwrap().total_requests, 0);
}

#[test]
fn test_sticky_client_affinity() {
    let (pool, clock) = manual_pool();
    register(
        &pool,
        vec![
            ProxyEndpoint::new("e1", "a:1").with_circuit(1, 1, 60),
            ProxyEndpoint::new("e2", "b:1").with_circuit(1, 1, 60),
            ProxyEndpoint::new("e3", "c:1").with_circuit(1, 1, 60),
        ],
    );

    let first = pool.acquire(Some("client-a")).unwrap();
    succeed(&pool, &first);
    for _ in 0..20 {
        let lease = pool.acquire(Some("client-a")).unwrap();
        assert_eq!(lease.endpoint_id, first.endpoint_id);
        succeed(&pool, &lease);
    }

    // The bound endpoint opens; the client moves on.
    pool.report_outcome(&first.endpoint_id, false, None);
    let moved = pool.acquire(Some("client-a")).unwrap();
    assert_ne!(moved.endpoint_id, first.endpoint_id);
    succeed(&pool, &moved);

    // Idle bindings are pruned by the sweep.
    clock.advance(secs(301));
    let report = pool.sweep_expired();
    assert_eq!(report, SweepReport { expired_leases: 0, pruned_bindings: 1 });
    assert_eq!(pool.sticky_bindings(), 0);
}

#[test]
fn test_release_is_idempotent() {
    let (pool, _) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1")]);

    let lease = pool.acquire(None).unwrap();
    assert!(pool.release(&lease, LeaseOutcome::Failure, None));
    assert!(!pool.release(&lease, LeaseOutcome::Failure, None));
    assert!(!pool.release(&lease, LeaseOutcome::Success, None));

    let health = pool.health_of("e1").unwrap();
    assert_eq!(health.total_requests, 1);
    assert_eq!(health.consecutive_failures, 1);
    assert_eq!(pool.active_leases("e1"), 0);
}

#[test]
fn test_expired_lease_is_neutral() {
    let (pool, clock) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_max_sessions(1).with_circuit(1, 1, 10)]);

    let lease = pool.acquire(None).unwrap();
    clock.advance(secs(29));
    assert_eq!(pool.sweep_expired().expired_leases, 0);
    clock.advance(secs(1));
    assert_eq!(pool.sweep_expired().expired_leases, 1);

    assert!(!pool.release(&lease, LeaseOutcome::Failure, None));
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::Closed));
    assert_eq!(pool.health_of("e1").unwrap().total_requests, 0);
    assert!(pool.acquire(None).is_ok());
}

#[test]
fn test_expired_probe_frees_probe_slot() {
    let (pool, clock) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_circuit(1, 1, 10)]);
    fail_times(&pool, 1);

    clock.advance(secs(10));
    let probe = pool.acquire(None).unwrap();
    assert!(probe.probe);
    assert_eq!(pool.acquire(None), Err(PoolError::NoEligibleEndpoint));

    clock.advance(secs(30));
    assert_eq!(pool.sweep_expired().expired_leases, 1);
    assert_eq!(pool.circuit_state("e1"), Some(CircuitState::HalfOpen));
    assert!(pool.acquire(None).unwrap().probe);
}

#[test]
fn test_deregister_drain_flow() {
    let (pool, _) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1"), ProxyEndpoint::new("e2", "b:1")]);

    let mut held = Vec::new();
    while held.len() < 6 {
        held.push(pool.acquire(None).unwrap());
    }
    let on_e1 = held.iter().filter(|l| l.endpoint_id == "e1").count();

    match pool.deregister_endpoint("e1") {
        Err(PoolError::InUse { active_leases, .. }) => assert_eq!(active_leases, on_e1),
        other => panic!("expected InUse, got {other:?}"),
    }
    assert_eq!(pool.force_expire("e1"), Ok(on_e1));
    pool.deregister_endpoint("e1").unwrap();

    for lease in &held {
        let released = pool.release(lease, LeaseOutcome::Success, None);
        assert_eq!(released, lease.endpoint_id == "e2");
    }
    assert_eq!(pool.outstanding_leases(), 0);
    assert_eq!(pool.force_expire("e1"), Err(PoolError::NotFound("e1".into())));

    let ids: Vec<String> = pool.snapshot().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["e2".to_string()]);
}

#[test]
fn test_warmup_scores_neutral() {
    let (pool, _) = manual_pool();
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1").with_warmup(3)]);

    pool.report_outcome("e1", false, Some(500.0));
    pool.report_outcome("e1", false, Some(500.0));
    let row = &pool.snapshot()[0];
    assert!(row.in_warmup);
    assert_eq!(row.score, 1.0);

    pool.report_outcome("e1", true, Some(500.0));
    let row = &pool.snapshot()[0];
    assert!(!row.in_warmup);
    assert!(row.score < 1.0);
}

#[test]
fn test_round_robin_strategy_from_settings() {
    let settings: PoolSettings = toml::from_str("strategy = \"round_robin\"").unwrap();
    let (pool, _) = manual_pool_with(settings);
    register(&pool, vec![ProxyEndpoint::new("e1", "a:1"), ProxyEndpoint::new("e2", "b:1")]);

    let picks: Vec<String> = (0..4)
        .map(|_| {
            let lease = pool.acquire(None).unwrap();
            pool.release(&lease, LeaseOutcome::Unknown, None);
            lease.endpoint_id
        })
        .collect();
    assert_eq!(picks, vec!["e1", "e2", "e1", "e2"]);
}

#[test]
fn test_config_to_pool() {
    let config = endpoint_pool::config::loader::parse_config(
        r#"
        [pool]
        lease_ttl_secs = 5

        [[endpoints]]
        id = "edge-1"
        address = "10.0.0.1:443"
        weight = 2.0
        max_concurrent_sessions = 1

        [[endpoints]]
        id = "edge-2"
        address = "10.0.0.2:443"
        region = "eu-west"
        "#,
    )
    .unwrap();

    let pool = endpoint_pool::DynamicProxyPool::from_config(&config).unwrap();
    let snapshot = pool.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].region.as_deref(), Some("eu-west"));

    let lease = pool.acquire(None).unwrap();
    assert_eq!(lease.expires_at_ms - lease.issued_at_ms, 5_000);
}
