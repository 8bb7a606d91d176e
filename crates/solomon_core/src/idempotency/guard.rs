//! At-most-once execution guard.
//!
//! Per key:
//! 1. Look the key up in the store at `now`.
//! 2. Hit with a different fingerprint -> `Conflict`, nothing runs.
//! 3. Hit with the same fingerprint -> replay the stored payload.
//! 4. Miss -> resolve `expires_at = now + ttl` (overflow fails here, before
//!    anything runs), then run `execute`. Errors propagate and are never
//!    cached. Success is recorded with that `expires_at`, then returned.
//!
//! The domain mutation and the record write are two separate steps. Two
//! callers racing on the same fresh key can both execute; the store's
//! `put` guarantees only one record survives, and a racing caller with a
//! different fingerprint gets `Conflict` from `put`.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::command::require_idempotency_key;
use super::hash::RequestFingerprint;
use super::metrics::GuardMetrics;
use super::record::IdempotencyRecord;
use super::store::{IdempotencyStore, PutOutcome};
use crate::clock::Clock;
use crate::error::IdempotencyError;

/// Default record lifetime: 7 days.
pub const DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default record lifetime as a [`Duration`].
pub fn default_ttl() -> Duration {
    Duration::seconds(DEFAULT_TTL_SECS)
}

/// Resolve a caller-supplied TTL. Unset or non-positive falls back to the
/// 7 day default.
pub fn resolve_ttl(ttl: Option<Duration>) -> Duration {
    match ttl {
        Some(ttl) if ttl > Duration::zero() => ttl,
        _ => default_ttl(),
    }
}

/// Idempotent-execution guard for one module.
///
/// Cheap to share: wrap in an `Arc` and hand it to every request worker.
pub struct IdempotencyGuard {
    module: String,
    store: Arc<dyn IdempotencyStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    metrics: GuardMetrics,
}

impl std::fmt::Debug for IdempotencyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyGuard")
            .field("module", &self.module)
            .field("ttl", &self.ttl)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl IdempotencyGuard {
    /// Create a guard with the default TTL.
    pub fn new(
        module: impl Into<String>,
        store: Arc<dyn IdempotencyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            module: module.into(),
            store,
            clock,
            ttl: default_ttl(),
            metrics: GuardMetrics::new(),
        }
    }

    /// Override the record lifetime. Non-positive values keep the default.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = resolve_ttl(Some(ttl));
        self
    }

    /// Module name attached to every log event.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Lifetime given to records written by this guard.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Counters for this guard.
    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }

    /// Run `execute` at most once per `key`, replaying its payload to retries.
    ///
    /// `key` must already be validated as non-blank. Errors from `execute`
    /// reach the caller unchanged.
    pub fn run_raw<E, F>(&self, key: &str, request_hash: &str, execute: F) -> Result<Vec<u8>, E>
    where
        E: From<IdempotencyError>,
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        let now = self.clock.now();

        if let Some(record) = self.store.get(key, now)? {
            if record.request_hash != request_hash {
                self.metrics.record_conflict();
                tracing::warn!(
                    module = %self.module,
                    idempotency_key = %key,
                    "idempotency_conflict: key reused with different request"
                );
                return Err(IdempotencyError::Conflict {
                    key: key.to_string(),
                }
                .into());
            }
            self.metrics.record_replay();
            tracing::debug!(
                module = %self.module,
                idempotency_key = %key,
                "idempotent_operation_replayed"
            );
            return Ok(record.payload);
        }

        // Resolved before `execute` so an unrepresentable expiry can never
        // leave a domain effect applied but unrecorded.
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            IdempotencyError::ExpiryOverflow {
                ttl_secs: self.ttl.num_seconds(),
            }
        })?;

        let payload = match execute() {
            Ok(payload) => payload,
            Err(err) => {
                self.metrics.record_failed_execution();
                tracing::debug!(
                    module = %self.module,
                    idempotency_key = %key,
                    "idempotent_operation_failed; result not cached"
                );
                return Err(err);
            }
        };

        let outcome = self
            .store
            .put(IdempotencyRecord {
                key: key.to_string(),
                request_hash: request_hash.to_string(),
                payload: payload.clone(),
                expires_at,
            })
            .inspect_err(|err| {
                if matches!(err, IdempotencyError::Conflict { .. }) {
                    self.metrics.record_conflict();
                    tracing::warn!(
                        module = %self.module,
                        idempotency_key = %key,
                        "idempotency_conflict: concurrent request recorded first"
                    );
                }
            })?;

        self.metrics.record_execution();
        tracing::debug!(
            module = %self.module,
            idempotency_key = %key,
            duplicate = outcome == PutOutcome::Duplicate,
            "idempotent_operation_committed"
        );
        Ok(payload)
    }

    /// Typed variant of [`run_raw`](Self::run_raw). The result is stored as
    /// JSON and decoded on every path, so a first call and its replays
    /// return identical values.
    pub fn run<T, E, F>(&self, key: &str, request_hash: &str, execute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<IdempotencyError>,
        F: FnOnce() -> Result<T, E>,
    {
        let payload = self.run_raw(key, request_hash, || {
            let value = execute()?;
            serde_json::to_vec(&value).map_err(|e| {
                E::from(IdempotencyError::Codec {
                    reason: format!("failed to encode result: {e}"),
                })
            })
        })?;

        serde_json::from_slice(&payload).map_err(|e| {
            E::from(IdempotencyError::Codec {
                reason: format!("failed to decode stored result for key {key}: {e}"),
            })
        })
    }

    /// Entry point for command handlers.
    ///
    /// Rejects a blank key before any store access, trims the key, and runs
    /// `execute` under the finished fingerprint.
    pub fn run_command<T, E, F>(
        &self,
        key: &str,
        request: &RequestFingerprint,
        execute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<IdempotencyError>,
        F: FnOnce() -> Result<T, E>,
    {
        let key = require_idempotency_key(key)?;
        self.run(key, &request.finish(), execute)
    }
}
