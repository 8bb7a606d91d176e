//! Request fingerprint computation.
//!
//! `fingerprint = sha256(count_be64 field_0 0xFF field_1 0xFF ... field_n)`,
//! hex encoded. The leading field count keeps `[]` and `[""]` apart.
//!
//! Only the semantically relevant fields of a request go in, after
//! normalization, so a legitimate retry with cosmetic differences (padding
//! whitespace, enum casing) maps to the same digest. Never include
//! wall-clock timestamps or generated IDs.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::IdempotencyError;

/// Separator byte between fields. 0xFF cannot appear in UTF-8, so
/// `["ab", "c"]` and `["a", "bc"]` never collide.
const FIELD_SEPARATOR: u8 = 0xFF;

/// Compute the fingerprint of an ordered list of values.
///
/// Deterministic and order-sensitive. Values are hashed verbatim; use
/// [`RequestFingerprint`] when fields need trimming or case folding.
pub fn fingerprint(values: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((values.len() as u64).to_be_bytes());
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint an operation name together with the JSON encoding of a
/// request struct.
///
/// Field order follows the struct's `Serialize` impl, which is stable for
/// derived impls. Maps should be `BTreeMap` so key order is deterministic.
pub fn fingerprint_json<T: Serialize>(
    operation: &str,
    request: &T,
) -> Result<String, IdempotencyError> {
    let body = serde_json::to_string(request).map_err(|e| IdempotencyError::Codec {
        reason: format!("failed to encode request for fingerprint: {e}"),
    })?;
    Ok(fingerprint(&[operation, &body]))
}

/// Builder for the canonical field list of a mutating request.
///
/// The first field is always the operation name, which scopes the digest
/// so two operations sharing argument shapes cannot collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFingerprint {
    fields: Vec<String>,
}

impl RequestFingerprint {
    /// Start a fingerprint scoped to `operation`.
    pub fn new(operation: &str) -> Self {
        Self {
            fields: vec![operation.to_string()],
        }
    }

    /// Identifier-like field: surrounding whitespace is dropped.
    pub fn field(mut self, value: &str) -> Self {
        self.fields.push(value.trim().to_string());
        self
    }

    /// Enum or free-text field: trimmed and lower-cased.
    pub fn normalized(mut self, value: &str) -> Self {
        self.fields.push(value.trim().to_lowercase());
        self
    }

    /// Boolean field, hashed as `true` or `false`.
    pub fn flag(mut self, value: bool) -> Self {
        self.fields
            .push(if value { "true" } else { "false" }.to_string());
        self
    }

    /// Integer field in decimal.
    pub fn number(mut self, value: i64) -> Self {
        self.fields.push(value.to_string());
        self
    }

    /// Optional field. `None` hashes as an empty field so positions stay
    /// aligned.
    pub fn optional(self, value: Option<&str>) -> Self {
        self.field(value.unwrap_or_default())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Digest of the fields collected so far.
    pub fn finish(&self) -> String {
        let refs: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        fingerprint(&refs)
    }
}
