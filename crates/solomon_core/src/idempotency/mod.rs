//! Idempotency primitives: request fingerprinting, record storage port and
//! the at-most-once execution guard shared by every module's command layer.

pub mod command;
pub mod guard;
pub mod hash;
pub mod metrics;
pub mod record;
pub mod store;

pub use command::require_idempotency_key;
pub use guard::{DEFAULT_TTL_SECS, IdempotencyGuard, default_ttl, resolve_ttl};
pub use hash::{RequestFingerprint, fingerprint, fingerprint_json};
pub use metrics::{GuardMetrics, GuardMetricsSnapshot};
pub use record::IdempotencyRecord;
pub use store::{IdempotencyStore, PutOutcome, check_put};
