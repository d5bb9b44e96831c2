//! Staleness check for files that may already be indexed.
//!
//! Compares a file's current modification time and size with the stored
//! record and with the completion time of the last indexing run.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::db::PhotoMetadata;

/// Filesystem fingerprint of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub modified: DateTime<Utc>,
    pub size: u64,
}

impl FileFingerprint {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let info = std::fs::metadata(path)?;
        Ok(Self {
            modified: info.modified()?.into(),
            size: info.len(),
        })
    }
}

/// Whether a file has to be (re-)extracted.
///
/// Files without a record are always stale. Otherwise the file is stale when
/// it was modified after the last completed run or after its record was
/// written, or when its mtime or size no longer match the record.
pub fn needs_indexing(
    stored: Option<&PhotoMetadata>,
    current: &FileFingerprint,
    last_indexed: Option<DateTime<Utc>>,
) -> bool {
    let Some(stored) = stored else {
        return true;
    };

    if last_indexed.is_some_and(|t| current.modified > t) {
        return true;
    }

    current.modified > stored.indexed_at
        || current.modified != stored.modified_time
        || current.size != stored.file_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn stored(modified: DateTime<Utc>, indexed_at: DateTime<Utc>, size: u64) -> PhotoMetadata {
        let taken = NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut m = PhotoMetadata::new("/p/a.jpg", taken, modified, size);
        m.indexed_at = indexed_at;
        m
    }

    #[test]
    fn test_unknown_file_is_stale() {
        let fp = FileFingerprint {
            modified: Utc::now(),
            size: 1,
        };
        assert!(needs_indexing(None, &fp, Some(Utc::now())));
    }

    #[test]
    fn test_unchanged_file_is_fresh() {
        let modified = Utc::now() - Duration::hours(2);
        let record = stored(modified, modified + Duration::minutes(5), 10);
        let fp = FileFingerprint { modified, size: 10 };
        assert!(!needs_indexing(
            Some(&record),
            &fp,
            Some(modified + Duration::hours(1))
        ));
    }

    #[test]
    fn test_size_change_is_stale() {
        let modified = Utc::now() - Duration::hours(2);
        let record = stored(modified, modified + Duration::minutes(5), 10);
        let fp = FileFingerprint { modified, size: 11 };
        assert!(needs_indexing(Some(&record), &fp, None));
    }

    #[test]
    fn test_modified_after_last_run_is_stale() {
        let modified = Utc::now() - Duration::hours(2);
        let record = stored(modified, Utc::now(), 10);
        let later = FileFingerprint {
            modified: modified + Duration::hours(1),
            size: 10,
        };
        assert!(needs_indexing(Some(&record), &later, Some(modified)));
    }

    #[test]
    fn test_fingerprint_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileFingerprint::of(&dir.path().join("gone.jpg")).is_err());
    }
}
