//! Shared pieces of the per-module command handlers.

use crate::error::IdempotencyError;

/// Validate and normalize an `Idempotency-Key` value.
///
/// Returns the trimmed key. Blank or whitespace-only keys are rejected with
/// `KeyRequired`; callers must do this before touching any store.
pub fn require_idempotency_key(key: &str) -> Result<&str, IdempotencyError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(IdempotencyError::KeyRequired);
    }
    Ok(trimmed)
}
