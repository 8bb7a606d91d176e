#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use solomon_core::IdempotencyError;
use solomon_core::clock::ManualClock;
use solomon_core::idempotency::{IdempotencyGuard, IdempotencyRecord, IdempotencyStore, PutOutcome};
use solomon_infra::store::InMemoryIdempotencyStore;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap()
}

/// Guard over a fresh in-memory store and a manual clock at `t0`.
pub fn guard_fixture(
    module: &str,
) -> (
    Arc<IdempotencyGuard>,
    Arc<InMemoryIdempotencyStore>,
    Arc<ManualClock>,
) {
    let store = Arc::new(InMemoryIdempotencyStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let guard = IdempotencyGuard::new(module, store.clone(), clock.clone());
    (Arc::new(guard), store, clock)
}

/// Store wrapper that counts every call reaching the inner store.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: InMemoryIdempotencyStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl CountingStore {
    pub fn accesses(&self) -> usize {
        self.gets.load(Ordering::SeqCst) + self.puts.load(Ordering::SeqCst)
    }
}

impl IdempotencyStore for CountingStore {
    fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key, now)
    }

    fn put(&self, record: IdempotencyRecord) -> Result<PutOutcome, IdempotencyError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(record)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        self.inner.purge_expired(now)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub fn temp_journal_path(tag: &str) -> std::path::PathBuf {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!(
        "solomon_idempotency_{tag}_{}_{}.jsonl",
        std::process::id(),
        nanos
    ))
}

pub fn remove_if_exists(path: &std::path::Path) {
    let _ = std::fs::remove_file(path);
}
