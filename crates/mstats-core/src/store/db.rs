//! redb storage for run history and delivery data.
//!
//! # Table design
//!
//! Timestamps are encoded as a 12-byte time key:
//! ```text
//! [ secs: i64 with the sign bit flipped, big-endian | nanos: u32 big-endian ]
//! ```
//! Byte order equals chronological order at full precision, including
//! instants before 1970.
//!
//! `RUNS` uses a 29-byte composite key:
//! ```text
//! [ alignment tag: u8 | updated_to: time key | uuid: 16 bytes ]
//! ```
//! so the last run for an alignment as of some instant is the final entry of
//! a single range scan.
//!
//! `DELIVERIES` uses a 28-byte key `[ logged_at: time key | uuid ]`, which
//! keeps delivery entries in logging order.
//!
//! Values are JSON-encoded records.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{Result, StatsError};
use crate::interval::Alignment;
use crate::requirements::RunHistory;

use super::record::{DeliveryEntry, RunRecord};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type BytesTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

const RUNS: BytesTable = TableDefinition::new("runs");
const DELIVERIES: BytesTable = TableDefinition::new("deliveries");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn time_key(ts: DateTime<Utc>) -> [u8; 12] {
    let secs = (ts.timestamp() as u64) ^ (1 << 63);
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&secs.to_be_bytes());
    key[8..].copy_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
    key
}

fn run_key(alignment: Alignment, ts: DateTime<Utc>, id_bytes: &[u8; 16]) -> [u8; 29] {
    let mut key = [0u8; 29];
    key[0] = alignment.tag();
    key[1..13].copy_from_slice(&time_key(ts));
    key[13..].copy_from_slice(id_bytes);
    key
}

fn delivery_key(ts: DateTime<Utc>, id_bytes: &[u8; 16]) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..12].copy_from_slice(&time_key(ts));
    key[12..].copy_from_slice(id_bytes);
    key
}

const MIN_ID: [u8; 16] = [0x00; 16];
const MAX_ID: [u8; 16] = [0xff; 16];

fn unavailable(e: impl std::fmt::Display) -> StatsError {
    StatsError::CollaboratorUnavailable(e.to_string())
}

// ---------------------------------------------------------------------------
// StatsDb
// ---------------------------------------------------------------------------

pub struct StatsDb {
    db: Database,
}

impl StatsDb {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(unavailable)?;
        let wt = db.begin_write().map_err(unavailable)?;
        wt.open_table(RUNS).map_err(unavailable)?;
        wt.open_table(DELIVERIES).map_err(unavailable)?;
        wt.commit().map_err(unavailable)?;
        tracing::debug!(path = %path.display(), "opened statistics database");
        Ok(Self { db })
    }

    /// Record that `alignment` has been brought up to `updated_to`.
    pub fn record_run(
        &self,
        alignment: Alignment,
        updated_to: DateTime<Utc>,
        recorded_at: DateTime<Utc>,
    ) -> Result<RunRecord> {
        let record = RunRecord::new(alignment, updated_to, recorded_at);
        let key = run_key(alignment, updated_to, record.id.as_bytes());
        let value = serde_json::to_vec(&record)?;
        self.put(RUNS, &key, &value)?;
        tracing::info!(%alignment, updated_to = %updated_to, "recorded statistics run");
        Ok(record)
    }

    pub fn log_delivery(&self, entry: &DeliveryEntry) -> Result<()> {
        let key = delivery_key(entry.logged_at, entry.id.as_bytes());
        let value = serde_json::to_vec(entry)?;
        self.put(DELIVERIES, &key, &value)
    }

    /// The run with the greatest `updated_to <= as_of` for `alignment`.
    pub fn last_run_record(
        &self,
        alignment: Alignment,
        as_of: DateTime<Utc>,
    ) -> Result<Option<RunRecord>> {
        let lower = run_key(alignment, DateTime::<Utc>::MIN_UTC, &MIN_ID);
        let upper = run_key(alignment, as_of, &MAX_ID);
        self.last_in_range(&lower, &upper)
    }

    /// The most recent run for `alignment`, regardless of when it reached.
    pub fn latest_run_record(&self, alignment: Alignment) -> Result<Option<RunRecord>> {
        let lower = run_key(alignment, DateTime::<Utc>::MIN_UTC, &MIN_ID);
        let upper = run_key(alignment, DateTime::<Utc>::MAX_UTC, &MAX_ID);
        self.last_in_range(&lower, &upper)
    }

    /// The earliest delivery entry at or after `from`.
    pub fn first_delivery_from(&self, from: DateTime<Utc>) -> Result<Option<DeliveryEntry>> {
        let lower = delivery_key(from, &MIN_ID);
        let rt = self.db.begin_read().map_err(unavailable)?;
        let table = rt.open_table(DELIVERIES).map_err(unavailable)?;
        let mut range = table.range(lower.as_slice()..).map_err(unavailable)?;
        match range.next() {
            Some(entry) => {
                let (_, v) = entry.map_err(unavailable)?;
                Ok(Some(serde_json::from_slice(v.value())?))
            }
            None => Ok(None),
        }
    }

    /// All runs in key order: by alignment, then `updated_to` ascending.
    pub fn list_runs(&self, alignment: Option<Alignment>) -> Result<Vec<RunRecord>> {
        let rt = self.db.begin_read().map_err(unavailable)?;
        let table = rt.open_table(RUNS).map_err(unavailable)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(unavailable)? {
            let (_, v) = entry.map_err(unavailable)?;
            let record: RunRecord = serde_json::from_slice(v.value())?;
            if alignment.map_or(true, |a| a == record.alignment) {
                result.push(record);
            }
        }
        Ok(result)
    }

    /// All delivery entries in logging order.
    pub fn list_deliveries(&self) -> Result<Vec<DeliveryEntry>> {
        let rt = self.db.begin_read().map_err(unavailable)?;
        let table = rt.open_table(DELIVERIES).map_err(unavailable)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(unavailable)? {
            let (_, v) = entry.map_err(unavailable)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    fn put(&self, definition: BytesTable, key: &[u8], value: &[u8]) -> Result<()> {
        let wt = self.db.begin_write().map_err(unavailable)?;
        {
            let mut table = wt.open_table(definition).map_err(unavailable)?;
            table.insert(key, value).map_err(unavailable)?;
        }
        wt.commit().map_err(unavailable)?;
        Ok(())
    }

    fn last_in_range(&self, lower: &[u8], upper: &[u8]) -> Result<Option<RunRecord>> {
        let rt = self.db.begin_read().map_err(unavailable)?;
        let table = rt.open_table(RUNS).map_err(unavailable)?;
        let mut range = table.range(lower..=upper).map_err(unavailable)?;
        match range.next_back() {
            Some(entry) => {
                let (_, v) = entry.map_err(unavailable)?;
                Ok(Some(serde_json::from_slice(v.value())?))
            }
            None => Ok(None),
        }
    }
}

impl RunHistory for StatsDb {
    fn last_run(
        &self,
        alignment: Alignment,
        as_of: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .last_run_record(alignment, as_of)?
            .map(|record| record.updated_to))
    }

    fn earliest_logged(&self, alignment: Alignment) -> Result<Option<DateTime<Utc>>> {
        let covered_to = self
            .latest_run_record(alignment)?
            .map(|record| record.updated_to)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self
            .first_delivery_from(covered_to)?
            .map(|entry| entry.logged_at))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
