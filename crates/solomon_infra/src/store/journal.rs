//! Durable idempotency store backed by a JSON-lines journal.
//!
//! Every inserted record is appended as one JSON line and fsynced before
//! `put` returns, so a replayable result survives a restart. Evictions only
//! touch the in-memory index; expired lines are dropped when the journal is
//! reopened or compacted.
//!
//! Opening fails closed: a corrupt line, or two live records for one key
//! with different fingerprints, refuses to load rather than guessing.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use solomon_core::IdempotencyError;
use solomon_core::idempotency::{IdempotencyRecord, IdempotencyStore, PutOutcome, check_put};

#[derive(Debug)]
struct JournalState {
    records: HashMap<String, IdempotencyRecord>,
    file: File,
}

/// Journal-backed store. Same semantics as the in-memory store.
#[derive(Debug)]
pub struct JournalIdempotencyStore {
    state: Mutex<JournalState>,
    path: PathBuf,
}

impl JournalIdempotencyStore {
    /// Create or load a journal at `path`. Records expired at `now` are
    /// skipped during replay.
    pub fn open(path: impl AsRef<Path>, now: DateTime<Utc>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let records = load_records(path, now)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "opened idempotency journal"
        );
        Ok(Self {
            state: Mutex::new(JournalState { records, file }),
            path: path.to_path_buf(),
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the journal with only the records live at `now`.
    ///
    /// Writes a sibling temp file, fsyncs it and renames it over the
    /// journal. Later appends go through the temp file's handle. Returns the
    /// number of records dropped.
    pub fn compact(&self, now: DateTime<Utc>) -> io::Result<usize> {
        let mut state = self.lock();
        let before = state.records.len();
        state.records.retain(|_, record| !record.is_expired_at(now));

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut live: Vec<&IdempotencyRecord> = state.records.values().collect();
        live.sort_by(|a, b| a.key.cmp(&b.key));
        for record in live {
            write_record(&mut tmp, record)?;
        }
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        // The handle already points at the renamed file and sits at its end,
        // so nothing after the rename can fail and strand appends.
        state.file = tmp;

        let dropped = before - state.records.len();
        tracing::info!(
            path = %self.path.display(),
            dropped,
            kept = state.records.len(),
            "compacted idempotency journal"
        );
        Ok(dropped)
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdempotencyStore for JournalIdempotencyStore {
    fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let mut state = self.lock();
        let Some(record) = state.records.get(key) else {
            return Ok(None);
        };
        if record.is_expired_at(now) {
            state.records.remove(key);
            tracing::debug!(idempotency_key = %key, "evicted expired idempotency record");
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    fn put(&self, record: IdempotencyRecord) -> Result<PutOutcome, IdempotencyError> {
        let mut state = self.lock();
        if let Some(outcome) = check_put(state.records.get(&record.key), &record)? {
            return Ok(outcome);
        }

        persist_record(&mut state.file, &record).map_err(|e| IdempotencyError::Storage {
            reason: format!("journal append failed for {}: {e}", self.path.display()),
        })?;

        state.records.insert(record.key.clone(), record);
        Ok(PutOutcome::Inserted)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        let mut state = self.lock();
        let before = state.records.len();
        state.records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - state.records.len())
    }

    fn len(&self) -> usize {
        self.lock().records.len()
    }
}

fn load_records(
    path: &Path,
    now: DateTime<Utc>,
) -> io::Result<HashMap<String, IdempotencyRecord>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    let reader = BufReader::new(file);
    let mut records: HashMap<String, IdempotencyRecord> = HashMap::new();
    let mut skipped_expired = 0usize;

    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: IdempotencyRecord = serde_json::from_str(trimmed).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "invalid idempotency record at line {} in {}: {e}",
                    index + 1,
                    path.display()
                ),
            )
        })?;
        if record.is_expired_at(now) {
            skipped_expired += 1;
            continue;
        }

        match records.get(&record.key) {
            Some(existing) if existing.request_hash != record.request_hash => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "conflicting live records for idempotency key '{}' in {}",
                        record.key,
                        path.display()
                    ),
                ));
            }
            Some(existing) if existing.expires_at >= record.expires_at => {}
            _ => {
                records.insert(record.key.clone(), record);
            }
        }
    }

    if skipped_expired > 0 {
        tracing::debug!(skipped_expired, "skipped expired journal records on replay");
    }
    Ok(records)
}

fn write_record(file: &mut File, record: &IdempotencyRecord) -> io::Result<()> {
    let line = serde_json::to_string(record).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to encode idempotency record: {e}"),
        )
    })?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")
}

fn persist_record(file: &mut File, record: &IdempotencyRecord) -> io::Result<()> {
    write_record(file, record)?;
    file.sync_all()
}
