//! The record a store keeps for each idempotency key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored outcome of a successful idempotent operation.
///
/// Once written, `(key, request_hash)` never changes for the lifetime of
/// the record. `payload` is replayed verbatim to retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Client-supplied idempotency token.
    pub key: String,
    /// Fingerprint of the request that produced this record.
    pub request_hash: String,
    /// Serialized result of the operation.
    pub payload: Vec<u8>,
    /// The record is honoured up to and including this instant.
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// True once `now` is strictly past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn expiry_boundary_is_inclusive() {
        let expires_at = Utc.with_ymd_and_hms(2026, 2, 13, 12, 0, 0).unwrap();
        let record = IdempotencyRecord {
            key: "k".to_string(),
            request_hash: "h".to_string(),
            payload: b"{}".to_vec(),
            expires_at,
        };
        assert!(!record.is_expired_at(expires_at - Duration::seconds(1)));
        assert!(!record.is_expired_at(expires_at));
        assert!(record.is_expired_at(expires_at + Duration::milliseconds(1)));
    }
}
