//! Connection pool integration tests.
//!
//! These tests drive the pool against the in-memory connections from
//! `sqlpool-testing`, so no database is required.
//!
//! ```bash
//! cargo test -p sqlpool --test pool
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sqlpool::{Connection, DataSourceConfig, IsolationLevel, Pool, PoolError};
use sqlpool_testing::MockFactory;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn pool_with(factory: &MockFactory) -> sqlpool::PoolBuilder<MockFactory> {
    Pool::builder(factory.clone())
        .url("mock://localhost/app")
        .username("app")
        .password("secret")
}

// =============================================================================
// Checkout and Return
// =============================================================================

#[test]
fn test_round_trip_reuses_real_connection() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let conn = pool.get().unwrap();
    let first_id = conn.id();
    let first = conn.metadata();
    assert_eq!(pool.status().active, 1);
    assert_eq!(pool.status().idle, 0);

    drop(conn);
    assert_eq!(pool.status().active, 0);
    assert_eq!(pool.status().idle, 1);
    assert!(factory.connection(0).unwrap().is_open());

    thread::sleep(Duration::from_millis(20));

    let conn = pool.get().unwrap();
    let second = conn.metadata();
    assert_eq!(conn.id(), first_id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.last_used_at > first.last_used_at);
    assert!(second.checkout_at > first.checkout_at);
    assert_eq!(pool.status().idle, 0);
    assert_eq!(factory.opened(), 1);
}

#[test]
fn test_idle_connections_are_reused_in_return_order() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let (a_id, b_id) = (a.id(), b.id());
    assert_ne!(a_id, b_id);

    drop(b);
    drop(a);

    assert_eq!(pool.get().unwrap().id(), b_id);
}

#[test]
fn test_idle_overflow_closes_connection() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).max_idle_connections(1).build().unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    drop(a);
    drop(b);

    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.active, 0);
    assert_eq!(factory.open_count(), 1);
    assert!(!factory.connection(1).unwrap().is_open());
    assert_eq!(pool.metrics().connections_closed, 1);
}

#[test]
fn test_close_returns_instead_of_closing() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let mut conn = pool.get().unwrap();
    conn.execute("SELECT 1").unwrap();
    conn.close().unwrap();

    assert!(factory.connection(0).unwrap().is_open());
    assert_eq!(factory.connection(0).unwrap().close_calls(), 0);
    assert_eq!(pool.status().idle, 1);

    // Closing twice is a no-op.
    conn.close().unwrap();
    assert_eq!(pool.status().idle, 1);
    assert_eq!(pool.metrics().bad_connection_count, 0);
}

#[test]
fn test_returned_handle_is_invalid() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let mut conn = pool.get().unwrap();
    conn.close().unwrap();

    assert!(!conn.is_valid());
    assert!(conn.is_closed().unwrap());
    assert!(conn.execute("SELECT 1").unwrap_err().is_illegal_state());
    assert!(conn.with_raw(|_| ()).unwrap_err().is_illegal_state());
    assert!(factory.connection(0).unwrap().executed().is_empty());
}

#[test]
fn test_handles_compare_by_real_connection() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let mut first = pool.get().unwrap();
    first.close().unwrap();
    let second = pool.get().unwrap();

    assert_eq!(first, second);
    let mut set = HashSet::new();
    set.insert(first.id());
    assert!(set.contains(&second.id()));
}

#[test]
fn test_connections_from_different_pools_are_distinct() {
    let first_pool = pool_with(&MockFactory::new()).build().unwrap();
    let second_pool = pool_with(&MockFactory::new()).build().unwrap();

    let a = first_pool.get().unwrap();
    let b = second_pool.get().unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a, b);
    let ids: HashSet<_> = [a.id(), b.id()].into_iter().collect();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_forwarded_operations_reach_real_connection() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let mut conn = pool.get().unwrap();
    conn.execute("UPDATE t SET x = 1").unwrap();
    conn.set_transaction_isolation(IsolationLevel::RepeatableRead)
        .unwrap();
    assert_eq!(
        conn.transaction_isolation().unwrap(),
        IsolationLevel::RepeatableRead
    );
    assert_eq!(conn.with_raw(|raw| raw.index()).unwrap(), 0);

    let handle = factory.connection(0).unwrap();
    assert_eq!(handle.executed(), vec!["UPDATE t SET x = 1".to_string()]);
}

#[test]
fn test_driver_errors_are_wrapped() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let mut conn = pool.get().unwrap();
    factory.connection(0).unwrap().kill();
    let err = conn.execute("SELECT 1").unwrap_err();
    assert!(matches!(err, PoolError::Connection(_)));
}

// =============================================================================
// Connection Initialization and Transactions
// =============================================================================

#[test]
fn test_factory_receives_data_source() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();
    drop(pool.get().unwrap());

    let state = factory.connection(0).unwrap().state();
    assert_eq!(state.data_source.url.as_deref(), Some("mock://localhost/app"));
    assert_eq!(state.data_source.username.as_deref(), Some("app"));
    assert_eq!(state.data_source.password.as_deref(), Some("secret"));
}

#[test]
fn test_new_connections_get_data_source_defaults() {
    let factory = MockFactory::new();
    let data_source = DataSourceConfig::new()
        .url("mock://localhost/app")
        .auto_commit(false)
        .default_transaction_isolation(IsolationLevel::Serializable);
    let pool = Pool::builder(factory.clone())
        .data_source(data_source)
        .build()
        .unwrap();

    let conn = pool.get().unwrap();
    assert!(!conn.auto_commit().unwrap());
    assert_eq!(
        conn.transaction_isolation().unwrap(),
        IsolationLevel::Serializable
    );
}

#[test]
fn test_manual_commit_connections_are_rolled_back() {
    let factory = MockFactory::new().manual_commit();
    let pool = pool_with(&factory).build().unwrap();

    let mut conn = pool.get().unwrap();
    let handle = factory.connection(0).unwrap();
    assert_eq!(handle.rollbacks(), 1, "rolled back at checkout");

    conn.execute("INSERT INTO t VALUES (1)").unwrap();
    drop(conn);
    assert_eq!(handle.rollbacks(), 2, "rolled back on return");
    assert_eq!(pool.status().idle, 1);
}

#[test]
fn test_rollback_failure_on_return_closes_connection() {
    let factory = MockFactory::new().manual_commit();
    let pool = pool_with(&factory).build().unwrap();

    let conn = pool.get().unwrap();
    factory.connection(0).unwrap().fail_rollback(true);
    drop(conn);

    assert_eq!(pool.status().idle, 0);
    assert!(factory.all_closed());
}

#[test]
fn test_close_failure_on_return_keeps_bookkeeping() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).max_idle_connections(1).build().unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    drop(a);
    factory.connection(1).unwrap().fail_close(true);
    drop(b);

    let status = pool.status();
    assert_eq!(status.active, 0);
    assert_eq!(status.idle, 1);
    assert_eq!(factory.connection(1).unwrap().close_calls(), 1);
    assert_eq!(pool.metrics().connections_closed, 1);

    // The pool keeps serving from the idle connection.
    let conn = pool.get().unwrap();
    assert_eq!(conn.with_raw(|raw| raw.index()).unwrap(), 0);
}

#[test]
fn test_connect_failure_is_reported() {
    let factory = MockFactory::new();
    factory.refuse_connections(true);
    let pool = pool_with(&factory).build().unwrap();

    let err = pool.get().unwrap_err();
    assert!(matches!(err, PoolError::Connect(_)));
    assert!(err.is_transient());
    assert_eq!(pool.status().total(), 0);

    factory.refuse_connections(false);
    assert!(pool.get().is_ok());
}

// =============================================================================
// Liveness Checks
// =============================================================================

#[test]
fn test_closed_idle_connection_is_skipped() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let b_id = b.id();
    drop(a);
    drop(b);

    factory.connection(0).unwrap().sever();

    let conn = pool.get().unwrap();
    assert_eq!(conn.id(), b_id);
    assert_eq!(pool.metrics().bad_connection_count, 1);
    assert_eq!(pool.status().idle, 0);
}

#[test]
fn test_ping_runs_only_after_idle_threshold() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .ping_enabled(true)
        .ping_query("SELECT 1")
        .ping_connections_not_used_for(Duration::from_secs(3600))
        .build()
        .unwrap();

    drop(pool.get().unwrap());
    drop(pool.get().unwrap());
    assert!(factory.connection(0).unwrap().executed().is_empty());

    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .ping_enabled(true)
        .ping_query("SELECT 1")
        .build()
        .unwrap();

    drop(pool.get().unwrap());
    assert!(
        factory
            .connection(0)
            .unwrap()
            .executed()
            .contains(&"SELECT 1".to_string())
    );
}

#[test]
fn test_ping_disabled_never_runs_query() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).ping_query("SELECT 1").build().unwrap();

    drop(pool.get().unwrap());
    drop(pool.get().unwrap());
    assert!(factory.connection(0).unwrap().executed().is_empty());
}

#[test]
fn test_broken_connection_is_discarded_on_return() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .ping_enabled(true)
        .ping_query("SELECT 1")
        .build()
        .unwrap();

    let conn = pool.get().unwrap();
    factory.connection(0).unwrap().kill();
    drop(conn);

    assert_eq!(pool.status().total(), 0);
    assert_eq!(pool.metrics().bad_connection_count, 1);
    assert!(factory.all_closed());
}

#[test]
fn test_exhausted_retries() {
    let factory = MockFactory::new();
    factory.open_broken(true);
    let pool = pool_with(&factory)
        .max_idle_connections(2)
        .max_local_bad_connection_tolerance(1)
        .ping_enabled(true)
        .ping_query("SELECT 1")
        .build()
        .unwrap();

    let err = pool.get().unwrap_err();
    assert!(matches!(err, PoolError::ExhaustedRetries { attempts: 4 }));
    assert_eq!(factory.opened(), 4);
    assert!(factory.all_closed());
    assert_eq!(pool.metrics().bad_connection_count, 4);
    assert_eq!(pool.status().total(), 0);
}

#[test]
fn test_bad_connections_within_tolerance_are_retried() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_idle_connections(2)
        .max_local_bad_connection_tolerance(1)
        .build()
        .unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    drop(a);
    drop(b);
    factory.connection(0).unwrap().sever();
    factory.connection(1).unwrap().sever();

    let conn = pool.get().unwrap();
    assert_eq!(factory.opened(), 3);
    assert_eq!(conn.with_raw(|raw| raw.index()).unwrap(), 2);
    assert_eq!(pool.metrics().bad_connection_count, 2);
}

// =============================================================================
// Overdue Reclaim and Waiting
// =============================================================================

#[test]
fn test_overdue_connection_is_reclaimed() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .max_checkout_time(Duration::from_millis(50))
        .time_to_wait(Duration::from_secs(5))
        .build()
        .unwrap();

    let mut stale = pool.get().unwrap();
    thread::sleep(Duration::from_millis(100));

    let fresh = pool.get().unwrap();
    assert_eq!(fresh.id(), stale.id());
    assert!(fresh.is_valid());
    assert!(!stale.is_valid());
    assert!(stale.execute("SELECT 1").unwrap_err().is_illegal_state());
    assert!(stale.is_closed().unwrap());

    let metrics = pool.metrics();
    assert_eq!(metrics.claimed_overdue_connection_count, 1);
    assert!(metrics.average_overdue_checkout_time >= Duration::from_millis(50));
    assert_eq!(factory.opened(), 1);

    // Releasing the stale handle must not disturb the new holder.
    drop(stale);
    assert_eq!(pool.status().active, 1);
    assert!(factory.connection(0).unwrap().is_open());
    assert_eq!(pool.metrics().bad_connection_count, 1);
}

#[test]
fn test_blocked_caller_is_woken_by_release() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .time_to_wait(Duration::from_secs(10))
        .build()
        .unwrap();

    let held = pool.get().unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            let started = Instant::now();
            let conn = pool.get().unwrap();
            (conn.id(), started.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(100));
    drop(held);

    let (id, waited) = waiter.join().unwrap();
    assert_eq!(id, held_id);
    assert!(waited < Duration::from_secs(10));
    assert_eq!(pool.metrics().had_to_wait_count, 1);
    assert_eq!(factory.opened(), 1);
}

#[test]
fn test_wait_is_counted_once_per_call() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .time_to_wait(Duration::from_millis(10))
        .build()
        .unwrap();

    let held = pool.get().unwrap();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get().map(|conn| conn.id()))
    };

    thread::sleep(Duration::from_millis(150));
    drop(held);

    assert!(waiter.join().unwrap().is_ok());
    assert_eq!(pool.metrics().had_to_wait_count, 1);
}

/// Counts `waiting for connection` events, which carry a `wait_ms` field.
struct WaitCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for WaitCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().fields().field("wait_ms").is_some() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_zero_time_to_wait_blocks_until_release() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .time_to_wait(Duration::ZERO)
        .build()
        .unwrap();

    let held = pool.get().unwrap();
    let held_id = held.id();
    let waits = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let pool = pool.clone();
        let waits = Arc::clone(&waits);
        thread::spawn(move || {
            let subscriber = Registry::default().with(WaitCounter(waits));
            tracing::subscriber::with_default(subscriber, || pool.get().map(|conn| conn.id()))
        })
    };

    thread::sleep(Duration::from_millis(200));
    drop(held);

    assert_eq!(waiter.join().unwrap().unwrap(), held_id);
    let waits = waits.load(Ordering::SeqCst);
    assert!((1..=2).contains(&waits), "waited {waits} times");
    assert_eq!(pool.metrics().had_to_wait_count, 1);
}

#[test]
fn test_zero_time_to_wait_is_interrupted_by_close() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .time_to_wait(Duration::ZERO)
        .build()
        .unwrap();

    let _held = pool.get().unwrap();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get().map(|conn| conn.id()))
    };

    thread::sleep(Duration::from_millis(100));
    pool.close();

    assert!(matches!(
        waiter.join().unwrap(),
        Err(PoolError::WaitInterrupted)
    ));
}

#[test]
fn test_close_interrupts_waiting_caller() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(1)
        .time_to_wait(Duration::from_secs(10))
        .build()
        .unwrap();

    let held = pool.get().unwrap();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get().map(|conn| conn.id()))
    };

    thread::sleep(Duration::from_millis(100));
    pool.close();

    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(PoolError::WaitInterrupted)));
    assert!(!held.is_valid());
    assert!(factory.all_closed());
    assert!(matches!(pool.get(), Err(PoolError::PoolClosed)));
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn test_force_close_all_closes_everything() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let held = pool.get().unwrap();
    drop(a);
    drop(b);
    assert_eq!(pool.status().idle, 2);
    assert_eq!(pool.status().active, 1);

    pool.force_close_all();

    assert_eq!(pool.status().total(), 0);
    assert!(factory.all_closed());
    assert!(!held.is_valid());

    drop(held);
    assert_eq!(pool.status().total(), 0);

    // The pool opens fresh connections afterwards.
    let conn = pool.get().unwrap();
    assert!(conn.is_valid());
    assert_eq!(factory.opened(), 4);
}

#[test]
fn test_force_close_all_survives_cleanup_failures() {
    let factory = MockFactory::new().manual_commit();
    let pool = pool_with(&factory).build().unwrap();

    let held = pool.get().unwrap();
    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let c = pool.get().unwrap();
    drop(a);
    drop(b);
    drop(c);

    factory.connection(0).unwrap().fail_close(true);
    factory.connection(0).unwrap().fail_rollback(true);
    factory.connection(2).unwrap().fail_close(true);

    pool.force_close_all();

    assert_eq!(pool.status().total(), 0);
    assert!(factory.all_closed());
    for conn in factory.connections() {
        assert_eq!(conn.close_calls(), 1);
    }
    assert_eq!(pool.metrics().connections_closed, 4);
    assert!(!held.is_valid());

    // Cleanup failures leave the pool usable.
    assert!(pool.get().unwrap().is_valid());
}

#[test]
fn test_credentials_change_retires_connections() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();
    let old_code = pool.expected_type_code();

    let conn = pool.get().unwrap();
    pool.set_password("rotated").unwrap();
    assert_ne!(pool.expected_type_code(), old_code);

    drop(conn);
    assert_eq!(pool.status().idle, 0);
    assert!(!factory.connection(0).unwrap().is_open());

    drop(pool.get().unwrap());
    let state = factory.connection(1).unwrap().state();
    assert_eq!(state.data_source.password.as_deref(), Some("rotated"));
    assert_eq!(pool.status().idle, 1);
}

#[test]
fn test_pool_limit_change_closes_connections() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    drop(pool.get().unwrap());
    pool.set_max_active_connections(2).unwrap();
    assert!(factory.all_closed());
    assert_eq!(pool.config().max_active_connections, 2);

    drop(pool.get().unwrap());
    pool.set_max_local_bad_connection_tolerance(7);
    assert_eq!(pool.status().idle, 1, "tolerance change keeps connections");
    assert_eq!(pool.config().max_local_bad_connection_tolerance, 7);
}

#[test]
fn test_dropping_pool_closes_connections() {
    let factory = MockFactory::new();
    let pool = pool_with(&factory).build().unwrap();

    drop(pool.get().unwrap());
    drop(pool.get().unwrap());
    assert_eq!(factory.open_count(), 1);

    drop(pool);
    assert!(factory.all_closed());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_checkout_respects_limits() {
    const MAX_ACTIVE: u32 = 3;

    let factory = MockFactory::new();
    let pool = pool_with(&factory)
        .max_active_connections(MAX_ACTIVE)
        .build()
        .unwrap();
    let in_use = Arc::new(Mutex::new(HashSet::new()));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let in_use = Arc::clone(&in_use);
            thread::spawn(move || {
                for _ in 0..50 {
                    let mut conn = pool.get().unwrap();
                    assert!(in_use.lock().insert(conn.id()), "connection handed out twice");

                    let status = pool.status();
                    assert!(status.total() <= MAX_ACTIVE);
                    assert!(status.active <= MAX_ACTIVE);

                    conn.execute("SELECT 1").unwrap();
                    in_use.lock().remove(&conn.id());
                    conn.close().unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let status = pool.status();
    assert_eq!(status.active, 0);
    assert!(status.idle <= MAX_ACTIVE);
    assert!(factory.opened() <= MAX_ACTIVE as usize);
    assert_eq!(pool.metrics().request_count, 400);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_pool_from_properties() {
    let factory = MockFactory::new();
    let pool = Pool::from_properties(
        factory.clone(),
        "url=mock://db;username=app;password=secret;defaultAutoCommit=false;\
         poolMaximumActiveConnections=2;poolPingEnabled=true;poolPingQuery=SELECT 1;\
         driver.loginTimeout=5",
    )
    .unwrap();

    let config = pool.config();
    assert_eq!(config.max_active_connections, 2);
    assert!(config.ping_enabled);
    assert_eq!(config.ping_query, "SELECT 1");

    let data_source = pool.data_source();
    assert_eq!(data_source.url.as_deref(), Some("mock://db"));
    assert_eq!(
        data_source.driver_properties.get("loginTimeout").map(String::as_str),
        Some("5")
    );

    let conn = pool.get().unwrap();
    assert!(!conn.auto_commit().unwrap());
    assert_eq!(
        factory.connection(0).unwrap().executed(),
        vec!["SELECT 1".to_string()]
    );
}

#[test]
fn test_invalid_properties_are_rejected() {
    let factory = MockFactory::new();
    assert!(matches!(
        Pool::from_properties(factory.clone(), "poolMaximumActiveConnections=lots"),
        Err(PoolError::Config(_))
    ));
    assert!(matches!(
        Pool::from_properties(factory, "poolPingEnabled=true;poolPingQuery="),
        Err(PoolError::Config(_))
    ));
}

#[cfg(feature = "serde")]
#[test]
fn test_config_serde_round_trip() {
    use sqlpool::PoolConfig;

    let config = PoolConfig::new()
        .max_active_connections(4)
        .max_checkout_time(Duration::from_millis(1500));
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"max_checkout_time\":1500"));

    let parsed: PoolConfig = serde_json::from_str(r#"{"max_active_connections":4}"#).unwrap();
    assert_eq!(parsed.max_active_connections, 4);
    assert_eq!(parsed.max_idle_connections, 5);
}
