//! Idempotency store adapters: in-memory map and JSON-lines journal.

pub mod journal;
pub mod memory;

pub use journal::JournalIdempotencyStore;
pub use memory::InMemoryIdempotencyStore;
