#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod idempotency;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::IdempotencyError;
