//! In-memory idempotency store.
//!
//! One mutex guards the whole map, so `get`/`put` on the same key are
//! totally ordered. Records are small and critical sections never block on
//! I/O, which keeps a store-wide lock cheap.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use solomon_core::IdempotencyError;
use solomon_core::idempotency::{IdempotencyRecord, IdempotencyStore, PutOutcome, check_put};

/// Process-local store, scoped to the instance. Share it with `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look at a record without applying expiry. Test and admin use only.
    pub fn peek(&self, key: &str) -> Option<IdempotencyRecord> {
        self.lock().get(key).cloned()
    }

    /// Insert a record unconditionally, replacing whatever the key holds.
    ///
    /// Bypasses the conflict check; used to seed fixtures such as already
    /// expired records.
    pub fn insert_raw(&self, record: IdempotencyRecord) {
        self.lock().insert(record.key.clone(), record);
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, IdempotencyRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let mut records = self.lock();
        let Some(record) = records.get(key) else {
            return Ok(None);
        };
        if record.is_expired_at(now) {
            records.remove(key);
            tracing::debug!(idempotency_key = %key, "evicted expired idempotency record");
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    fn put(&self, record: IdempotencyRecord) -> Result<PutOutcome, IdempotencyError> {
        let mut records = self.lock();
        if let Some(outcome) = check_put(records.get(&record.key), &record)? {
            return Ok(outcome);
        }
        records.insert(record.key.clone(), record);
        Ok(PutOutcome::Inserted)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let purged = before - records.len();
        if purged > 0 {
            tracing::debug!(purged, "purged expired idempotency records");
        }
        Ok(purged)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
