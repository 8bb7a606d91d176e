//! Error taxonomy of the idempotency protocol and its HTTP mapping.

use thiserror::Error;

/// Errors raised by the idempotency protocol itself.
///
/// Domain errors produced by a guarded operation never pass through this
/// type: the guard is generic over the caller's error and only converts
/// these variants into it via `From`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyError {
    /// A mutating command was invoked without an idempotency key.
    #[error("idempotency key is required")]
    KeyRequired,

    /// The key was already used for a request with a different fingerprint.
    #[error("idempotency key {key} reused with different request")]
    Conflict { key: String },

    /// A result could not be encoded for storage or decoded on replay.
    #[error("idempotency payload codec failed: {reason}")]
    Codec { reason: String },

    /// `now + ttl` is not a representable timestamp. Raised before the
    /// guarded operation runs.
    #[error("idempotency ttl of {ttl_secs}s overflows the record expiry")]
    ExpiryOverflow { ttl_secs: i64 },

    /// The backing store could not complete the operation.
    #[error("idempotency store unavailable: {reason}")]
    Storage { reason: String },
}

impl IdempotencyError {
    /// HTTP status the transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            IdempotencyError::KeyRequired => 400,
            IdempotencyError::Conflict { .. } => 409,
            IdempotencyError::Codec { .. } | IdempotencyError::ExpiryOverflow { .. } => 500,
            IdempotencyError::Storage { .. } => 503,
        }
    }

    /// Client errors are terminal for the call and must not be retried as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IdempotencyError::KeyRequired | IdempotencyError::Conflict { .. }
        )
    }
}
