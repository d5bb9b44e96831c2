//! The indexing stats singleton.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::{BUCKET_INDEXING_STATS, KEY_STATS};
use super::{Database, Tx};
use crate::error::StoreResult;

/// Progress and bookkeeping of indexing runs, stored as one JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexingStats {
    /// Persisted run flag; a crash-recovery checkpoint.
    pub active: bool,
    pub indexed_count: u64,
    /// `None` until a run has counted the library.
    pub total_count: Option<u64>,
    pub last_indexed_time: Option<DateTime<Utc>>,
    pub indexing_start_time: Option<DateTime<Utc>>,
    pub indexing_duration_seconds: Option<f64>,
    pub calculate_file_hashes: bool,
}

impl Database {
    pub fn indexing_stats(&self) -> StoreResult<IndexingStats> {
        self.view(read_stats)
    }

    /// Read-modify-write the stats record atomically and return the new value.
    pub fn update_stats<F>(&self, f: F) -> StoreResult<IndexingStats>
    where
        F: FnOnce(&mut IndexingStats),
    {
        self.update(|tx| {
            let mut stats = read_stats(tx)?;
            f(&mut stats);
            write_stats(tx, &stats)?;
            Ok(stats)
        })
    }

    /// Persist `active = true` unless a run is already recorded as active.
    /// Returns `false` when the flag was already set.
    pub fn mark_run_started(&self, started_at: DateTime<Utc>) -> StoreResult<bool> {
        self.update(|tx| {
            let mut stats = read_stats(tx)?;
            if stats.active {
                return Ok(false);
            }
            stats.active = true;
            stats.indexing_start_time = Some(started_at);
            write_stats(tx, &stats)?;
            Ok(true)
        })
    }

    /// Stamp completion time and duration, and clear `active`.
    pub fn mark_run_finished(&self, started_at: DateTime<Utc>) -> StoreResult<IndexingStats> {
        let finished_at = Utc::now();
        let elapsed = (finished_at - started_at).num_milliseconds() as f64 / 1000.0;
        self.update_stats(|stats| {
            stats.last_indexed_time = Some(finished_at);
            stats.indexing_duration_seconds = Some(elapsed.max(0.0));
            stats.active = false;
        })
    }
}

pub(crate) fn read_stats(tx: &Tx<'_>) -> StoreResult<IndexingStats> {
    Ok(tx
        .bucket(BUCKET_INDEXING_STATS)?
        .get_json(KEY_STATS)?
        .unwrap_or_default())
}

pub(crate) fn write_stats(tx: &Tx<'_>, stats: &IndexingStats) -> StoreResult<()> {
    tx.bucket(BUCKET_INDEXING_STATS)?.put_json(KEY_STATS, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;
    use crate::error::StoreError;

    #[test]
    fn test_defaults_before_any_run() {
        let (_dir, db) = open_temp();
        db.init_photo_metadata().unwrap();
        let stats = db.indexing_stats().unwrap();
        assert!(!stats.active);
        assert!(!stats.calculate_file_hashes);
        assert_eq!(stats.total_count, None);
        assert_eq!(stats.last_indexed_time, None);
    }

    #[test]
    fn test_update_stats_persists() {
        let (_dir, db) = open_temp();
        db.init_photo_metadata().unwrap();
        let updated = db
            .update_stats(|s| {
                s.active = true;
                s.total_count = Some(42);
            })
            .unwrap();
        assert_eq!(db.indexing_stats().unwrap(), updated);
        assert_eq!(updated.total_count, Some(42));
    }

    #[test]
    fn test_run_start_is_exclusive() {
        let (_dir, db) = open_temp();
        db.init_photo_metadata().unwrap();
        let started = Utc::now();

        assert!(db.mark_run_started(started).unwrap());
        assert!(!db.mark_run_started(Utc::now()).unwrap());

        let stats = db.mark_run_finished(started).unwrap();
        assert!(!stats.active);
        assert_eq!(stats.indexing_start_time, Some(started));
        assert!(stats.last_indexed_time.is_some());
        assert!(stats.indexing_duration_seconds.unwrap() >= 0.0);
        assert!(db.mark_run_started(Utc::now()).unwrap());
    }

    #[test]
    fn test_stats_require_initialization() {
        let (_dir, db) = open_temp();
        let err = db.indexing_stats().unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }
}
