#![forbid(unsafe_code)]

pub mod config;
pub mod store;

pub use config::{ConfigError, IdempotencyConfig};
pub use store::{InMemoryIdempotencyStore, JournalIdempotencyStore};
