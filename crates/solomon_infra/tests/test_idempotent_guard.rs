//! At-most-once execution guard against the in-memory store.

mod common;

use std::cell::Cell;

use chrono::Duration;
use solomon_core::idempotency::{
    GuardMetricsSnapshot, IdempotencyGuard, IdempotencyRecord, IdempotencyStore,
};
use solomon_core::{Clock, IdempotencyError};

use common::{guard_fixture, t0};

#[derive(Debug, PartialEq)]
enum TestError {
    Idempotency(IdempotencyError),
    Domain(&'static str),
}

impl From<IdempotencyError> for TestError {
    fn from(err: IdempotencyError) -> Self {
        TestError::Idempotency(err)
    }
}

fn payload(value: &str) -> Result<Vec<u8>, TestError> {
    Ok(value.as_bytes().to_vec())
}

// --- Concrete scenarios -------------------------------------------------

#[test]
fn test_first_call_executes_and_records() {
    let (guard, store, _clock) = guard_fixture("test-module");

    let out = guard.run_raw("k1", "h1", || payload("A")).unwrap();
    assert_eq!(out, b"A".to_vec());

    let record = store.peek("k1").expect("record stored");
    assert_eq!(record.key, "k1");
    assert_eq!(record.request_hash, "h1");
    assert_eq!(record.payload, b"A".to_vec());
    assert_eq!(record.expires_at, t0() + Duration::days(7));
}

#[test]
fn test_retry_replays_without_executing() {
    let (guard, _store, _clock) = guard_fixture("test-module");
    guard.run_raw("k1", "h1", || payload("A")).unwrap();

    let executed = Cell::new(false);
    let out = guard
        .run_raw("k1", "h1", || {
            executed.set(true);
            payload("B")
        })
        .unwrap();

    assert_eq!(out, b"A".to_vec());
    assert!(!executed.get(), "replay must not re-execute");
    assert_eq!(guard.metrics().replays_total(), 1);
    assert_eq!(guard.metrics().executions_total(), 1);
}

#[test]
fn test_key_reuse_with_different_request_conflicts() {
    let (guard, store, _clock) = guard_fixture("test-module");
    guard.run_raw("k1", "h1", || payload("A")).unwrap();

    let executed = Cell::new(false);
    let err = guard
        .run_raw("k1", "h2", || {
            executed.set(true);
            payload("Z")
        })
        .unwrap_err();

    assert_eq!(
        err,
        TestError::Idempotency(IdempotencyError::Conflict {
            key: "k1".to_string()
        })
    );
    assert!(!executed.get());
    let record = store.peek("k1").unwrap();
    assert_eq!(record.request_hash, "h1");
    assert_eq!(record.payload, b"A".to_vec());
    assert_eq!(guard.metrics().conflicts_total(), 1);
}

#[test]
fn test_failed_execution_is_not_cached() {
    let (guard, store, _clock) = guard_fixture("test-module");

    let err = guard
        .run_raw("k2", "h1", || Err(TestError::Domain("plan not found")))
        .unwrap_err();
    assert_eq!(err, TestError::Domain("plan not found"));
    assert!(store.peek("k2").is_none());
    assert_eq!(guard.metrics().failed_executions_total(), 1);

    let out = guard.run_raw("k2", "h1", || payload("C")).unwrap();
    assert_eq!(out, b"C".to_vec());
    assert_eq!(store.peek("k2").unwrap().payload, b"C".to_vec());
}

#[test]
fn test_expired_record_is_absent_and_evicted() {
    let (_guard, store, _clock) = guard_fixture("test-module");
    store.insert_raw(IdempotencyRecord {
        key: "k3".to_string(),
        request_hash: "h1".to_string(),
        payload: b"old".to_vec(),
        expires_at: t0() - Duration::seconds(1),
    });

    assert_eq!(store.get("k3", t0()).unwrap(), None);
    assert!(store.peek("k3").is_none(), "expired record must be evicted");
}

// --- Properties ---------------------------------------------------------

#[test]
fn test_call_after_expiry_re_executes_with_fresh_record() {
    let (_, store, clock) = guard_fixture("test-module");
    let ttl = Duration::hours(1);
    let guard = IdempotencyGuard::new("test-module", store.clone(), clock.clone()).with_ttl(ttl);

    guard.run_raw("k4", "h1", || payload("first")).unwrap();
    clock.advance(Duration::hours(1) + Duration::seconds(1));

    let executed = Cell::new(false);
    let out = guard
        .run_raw("k4", "h1", || {
            executed.set(true);
            payload("second")
        })
        .unwrap();

    assert!(executed.get());
    assert_eq!(out, b"second".to_vec());
    let record = store.peek("k4").unwrap();
    assert_eq!(record.payload, b"second".to_vec());
    assert_eq!(record.expires_at, clock.now() + ttl);
}

#[test]
fn test_record_still_honoured_at_exact_expiry() {
    let (guard, _store, clock) = guard_fixture("test-module");
    guard.run_raw("k5", "h1", || payload("A")).unwrap();
    clock.advance(Duration::days(7));

    let out = guard.run_raw("k5", "h1", || payload("B")).unwrap();
    assert_eq!(out, b"A".to_vec());
}

#[test]
fn test_different_keys_are_independent() {
    let (guard, store, _clock) = guard_fixture("test-module");
    guard.run_raw("a", "h1", || payload("A")).unwrap();
    guard.run_raw("b", "h2", || payload("B")).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn test_typed_run_replays_identical_value() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Subscription {
        subscription_id: String,
        amount_cents: i64,
    }

    let (guard, _store, _clock) = guard_fixture("subscription-service");
    let counter = Cell::new(0);
    let create = || -> Result<Subscription, TestError> {
        counter.set(counter.get() + 1);
        Ok(Subscription {
            subscription_id: format!("sub_{}", counter.get()),
            amount_cents: 4900,
        })
    };

    let first: Subscription = guard.run("idem-1", "h1", &create).unwrap();
    let second: Subscription = guard.run("idem-1", "h1", &create).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.subscription_id, "sub_1");
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_undecodable_payload_surfaces_codec_error() {
    let (guard, _store, _clock) = guard_fixture("test-module");
    guard.run_raw("k6", "h1", || payload("not json")).unwrap();

    let err = guard
        .run::<u32, TestError, _>("k6", "h1", || Ok(7))
        .unwrap_err();
    assert!(matches!(
        err,
        TestError::Idempotency(IdempotencyError::Codec { .. })
    ));
}

#[test]
fn test_unrepresentable_expiry_fails_before_execute() {
    let (_, store, clock) = guard_fixture("test-module");
    let guard = IdempotencyGuard::new("test-module", store.clone(), clock)
        .with_ttl(Duration::seconds(9_000_000_000_000));

    let executed = Cell::new(false);
    let err = guard
        .run_raw("k7", "h1", || {
            executed.set(true);
            payload("A")
        })
        .unwrap_err();

    assert_eq!(
        err,
        TestError::Idempotency(IdempotencyError::ExpiryOverflow {
            ttl_secs: 9_000_000_000_000
        })
    );
    assert!(!executed.get(), "execute must not run when expiry overflows");
    assert!(store.is_empty());
    assert_eq!(guard.metrics().snapshot(), GuardMetricsSnapshot::default());
}

#[test]
fn test_metrics_snapshot_counts_each_outcome() {
    let (guard, _store, _clock) = guard_fixture("test-module");

    guard.run_raw("k1", "h1", || payload("A")).unwrap();
    guard.run_raw("k1", "h1", || payload("A")).unwrap();
    guard.run_raw("k1", "h2", || payload("A")).unwrap_err();
    guard
        .run_raw("k2", "h1", || Err(TestError::Domain("rejected")))
        .unwrap_err();

    assert_eq!(
        guard.metrics().snapshot(),
        GuardMetricsSnapshot {
            executions_total: 1,
            replays_total: 1,
            conflicts_total: 1,
            failed_executions_total: 1,
        }
    );
}
