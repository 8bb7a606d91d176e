//! Storage port for idempotency records.
//!
//! Invariants every adapter upholds:
//! - At most one record per key.
//! - `put` never overwrites a live record. Same hash -> `Duplicate`,
//!   different hash -> `IdempotencyError::Conflict`.
//! - Expired records are invisible to `get` and evicted on sight.
//!
//! Adapters serialize all access with a single store-wide lock. A database
//! adapter gets the same guarantee from a unique index on `key` plus
//! insert-if-absent.

use chrono::{DateTime, Utc};

use super::record::IdempotencyRecord;
use crate::error::IdempotencyError;

/// Result of attempting to store a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// No live record existed for the key; the record was stored.
    Inserted,
    /// A live record with the same fingerprint already existed; nothing changed.
    Duplicate,
}

/// Key-value storage for idempotency records, shared by every guard that
/// writes to it.
pub trait IdempotencyStore: Send + Sync {
    /// Look up a live record. Returns `Ok(None)` when absent or expired at
    /// `now`; an expired record is evicted as a side effect.
    fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError>;

    /// Insert a record unless a live one exists for its key.
    fn put(&self, record: IdempotencyRecord) -> Result<PutOutcome, IdempotencyError>;

    /// Evict every record expired at `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyError>;

    /// Number of records held, including expired ones not yet evicted.
    fn len(&self) -> usize;

    /// True when no records are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decide a `put` against the record currently stored under the key.
///
/// `Ok(None)` means the key is free and the caller should insert.
pub fn check_put(
    existing: Option<&IdempotencyRecord>,
    incoming: &IdempotencyRecord,
) -> Result<Option<PutOutcome>, IdempotencyError> {
    match existing {
        None => Ok(None),
        Some(current) if current.request_hash == incoming.request_hash => {
            Ok(Some(PutOutcome::Duplicate))
        }
        Some(_) => Err(IdempotencyError::Conflict {
            key: incoming.key.clone(),
        }),
    }
}
