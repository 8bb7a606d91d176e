//! Idempotency configuration.
//!
//! Each module may override the record TTL. Resolution order for a module:
//! 1. `module_ttl_secs[module]` when positive.
//! 2. `default_ttl_secs` when positive.
//! 3. The built-in 7 day default.
//!
//! Unset and non-positive values never fail; they fall through to the next
//! level. Values above [`MAX_TTL_SECS`] are rejected with
//! `ConfigError::TtlOutOfRange` at load time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use solomon_core::clock::Clock;
use solomon_core::idempotency::{IdempotencyGuard, IdempotencyStore};
use thiserror::Error;

use crate::store::{InMemoryIdempotencyStore, JournalIdempotencyStore};

pub use solomon_core::idempotency::{DEFAULT_TTL_SECS, default_ttl};

/// Largest accepted TTL: 100 years.
pub const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Errors raised while loading or applying idempotency configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid idempotency config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("ttl for {scope} is {secs}s, above the {MAX_TTL_SECS}s maximum")]
    TtlOutOfRange { scope: String, secs: i64 },

    #[error("failed to open idempotency journal {path}: {source}")]
    Journal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve a TTL in seconds. `None` or non-positive -> 7 days; above
/// [`MAX_TTL_SECS`] -> `TtlOutOfRange`.
pub fn resolve_ttl_secs(ttl_secs: Option<i64>) -> Result<Duration, ConfigError> {
    resolve_scoped("default_ttl_secs", ttl_secs)
}

fn resolve_scoped(scope: &str, ttl_secs: Option<i64>) -> Result<Duration, ConfigError> {
    match ttl_secs {
        Some(secs) if secs > 0 => {
            let out_of_range = || ConfigError::TtlOutOfRange {
                scope: scope.to_string(),
                secs,
            };
            if secs > MAX_TTL_SECS {
                return Err(out_of_range());
            }
            Duration::try_seconds(secs).ok_or_else(out_of_range)
        }
        _ => Ok(default_ttl()),
    }
}

/// Idempotency settings shared by every module of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdempotencyConfig {
    /// Workspace-wide TTL override.
    pub default_ttl_secs: Option<i64>,
    /// Per-module TTL overrides, keyed by module name.
    pub module_ttl_secs: BTreeMap<String, i64>,
    /// When set, records are kept in a durable journal at this path.
    pub journal_path: Option<PathBuf>,
}

impl IdempotencyConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every configured TTL is within range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        resolve_ttl_secs(self.default_ttl_secs)?;
        for module in self.module_ttl_secs.keys() {
            self.ttl_for(module)?;
        }
        Ok(())
    }

    /// Effective TTL for `module`.
    pub fn ttl_for(&self, module: &str) -> Result<Duration, ConfigError> {
        match self.module_ttl_secs.get(module) {
            Some(&secs) if secs > 0 => {
                resolve_scoped(&format!("module_ttl_secs.{module}"), Some(secs))
            }
            _ => resolve_ttl_secs(self.default_ttl_secs),
        }
    }

    /// Build the configured store: a journal when `journal_path` is set,
    /// otherwise an in-memory map.
    pub fn build_store(&self) -> Result<Arc<dyn IdempotencyStore>, ConfigError> {
        match &self.journal_path {
            Some(path) => {
                let store = JournalIdempotencyStore::open(path, Utc::now()).map_err(|source| {
                    ConfigError::Journal {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(InMemoryIdempotencyStore::new())),
        }
    }

    /// Guard for `module` over a shared store, with the module's TTL applied.
    pub fn guard_for(
        &self,
        module: &str,
        store: Arc<dyn IdempotencyStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<IdempotencyGuard, ConfigError> {
        Ok(IdempotencyGuard::new(module, store, clock).with_ttl(self.ttl_for(module)?))
    }
}
