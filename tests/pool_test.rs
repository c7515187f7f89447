mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{
    build_pool, deterministic_config, generic_endpoint, transaction_endpoint, MockSession,
};
use ledger_mux::{ClientPool, PoolConfig, Role};

#[tokio::test]
async fn test_pool_filters_by_role() {
    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), MockSession::default()),
            (generic_endpoint("g2"), MockSession::default()),
            (transaction_endpoint("t1"), MockSession::default()),
        ],
        deterministic_config(),
    );

    let generic = pool.pool(Role::Generic);
    assert_eq!(generic.len(), 2);
    assert!(generic.iter().all(|h| h.roles().generic));

    let transaction = pool.pool(Role::Transaction);
    assert_eq!(transaction.len(), 1);
    assert_eq!(transaction[0].name(), "t1");
}

#[tokio::test]
async fn test_allow_list_filters_by_name() {
    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), MockSession::default()),
            (generic_endpoint("g2"), MockSession::default()),
            (generic_endpoint("g3"), MockSession::default()),
        ],
        deterministic_config(),
    );

    let allowed = pool.pool_filtered(Role::Generic, &["g2".to_string()]);
    assert_eq!(allowed.len(), 1);
    assert_eq!(allowed[0].name(), "g2");

    // empty allow-list allows everything
    let all = pool.pool_filtered(Role::Generic, &[]);
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_randomized_order_is_a_permutation() {
    let names = ["a", "b", "c", "d", "e"];
    let pool = build_pool(
        names
            .iter()
            .map(|n| (generic_endpoint(n), MockSession::default()))
            .collect(),
        PoolConfig::default(),
    );

    let candidates = pool.pool(Role::Generic);
    let seen: HashSet<String> = candidates.iter().map(|h| h.name().to_string()).collect();
    assert_eq!(candidates.len(), names.len());
    assert_eq!(seen.len(), names.len());
}

#[tokio::test]
async fn test_disable_after_max_errors_then_cooldown_readmission() {
    let config = PoolConfig {
        max_errors: 3,
        cooldown: Duration::from_millis(50),
        randomize: false,
    };
    let pool = build_pool(
        vec![
            (generic_endpoint("flaky"), MockSession::default()),
            (generic_endpoint("steady"), MockSession::default()),
        ],
        config,
    );
    let flaky = pool.handles()[0].clone();

    pool.report_error(&flaky);
    pool.report_error(&flaky);
    assert_eq!(pool.pool(Role::Generic).len(), 2, "still below the limit");

    pool.report_error(&flaky);
    assert_eq!(flaky.errors(), 3);
    let eligible = pool.pool(Role::Generic);
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].name(), "steady");

    tokio::time::sleep(Duration::from_millis(70)).await;

    let eligible = pool.pool(Role::Generic);
    assert_eq!(eligible.len(), 2, "cooldown elapsed, handle re-admitted");
    assert_eq!(flaky.errors(), 0, "error counter reset on re-admission");
}

#[tokio::test]
async fn test_errors_below_limit_never_disable() {
    let config = PoolConfig {
        max_errors: 3,
        cooldown: Duration::from_millis(50),
        randomize: false,
    };
    let pool = build_pool(vec![(generic_endpoint("g1"), MockSession::default())], config);
    let handle = pool.handles()[0].clone();

    pool.report_error(&handle);
    pool.report_error(&handle);
    assert_eq!(pool.pool(Role::Generic).len(), 1);
    assert_eq!(handle.errors(), 2);
}

#[tokio::test]
async fn test_latency_two_point_running_average() {
    let pool = build_pool(
        vec![(generic_endpoint("g1"), MockSession::default())],
        deterministic_config(),
    );
    let handle = pool.handles()[0].clone();

    assert_eq!(handle.latency_ms(), 0);

    pool.report_latency(&handle, 100);
    assert_eq!(handle.latency_ms(), 100, "first sample stored as-is");

    pool.report_latency(&handle, 50);
    assert_eq!(handle.latency_ms(), 75, "(100 + 50) / 2");

    pool.report_latency(&handle, 25);
    assert_eq!(handle.latency_ms(), 50, "(75 + 25) / 2");
}

#[tokio::test]
async fn test_empty_endpoint_list_rejected() {
    let result = ClientPool::<MockSession>::new(&[], PoolConfig::default(), |_| {
        Ok(MockSession::default())
    });
    assert!(result.is_err());
}
