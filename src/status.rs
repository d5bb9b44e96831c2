//! Read-only view of indexing progress.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::error::StoreResult;
use crate::scanner::discover_images;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingStatus {
    pub active: bool,
    pub indexed_count: u64,
    pub total_count: u64,
}

pub struct StatusReporter {
    db: Arc<Database>,
    library_root: PathBuf,
    extensions: Vec<String>,
}

impl StatusReporter {
    pub fn new(db: Arc<Database>, library_root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            db,
            library_root: library_root.into(),
            extensions,
        }
    }

    /// Current progress. Before any run has counted the library, the total
    /// comes from a fresh walk of the library root.
    pub fn indexing_status(&self) -> StoreResult<IndexingStatus> {
        let stats = self.db.indexing_stats()?;
        let total_count = match stats.total_count {
            Some(total) => total,
            None => discover_images(&self.library_root, &self.extensions).images.len() as u64,
        };
        Ok(IndexingStatus {
            active: stats.active,
            indexed_count: stats.indexed_count,
            total_count,
        })
    }

    /// When the last run finished, if one ever did.
    pub fn last_indexed_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.db.indexing_stats()?.last_indexed_time)
    }

    /// Wall-clock seconds of the last finished run.
    pub fn indexing_duration(&self) -> StoreResult<Option<f64>> {
        Ok(self.db.indexing_stats()?.indexing_duration_seconds)
    }
}

/// `"1 h 2 min 3 sec"`, `"2 min 3 sec"` or `"3 sec"`.
pub fn format_duration(seconds: f64) -> String {
    // Whole seconds; the fraction is dropped.
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{} h {} min {} sec", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{} min {} sec", minutes, secs)
    } else {
        format!("{} sec", secs)
    }
}

/// Flags a run whose `indexed_count` stops moving while it is still active.
#[derive(Debug)]
pub struct StuckRunDetector {
    threshold: u32,
    last_count: Option<u64>,
    unchanged_polls: u32,
}

impl StuckRunDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last_count: None,
            unchanged_polls: 0,
        }
    }

    /// Feed one poll. Returns `true` once the count has stayed the same for
    /// `threshold` consecutive polls of an active run.
    pub fn observe(&mut self, status: &IndexingStatus) -> bool {
        if !status.active {
            self.last_count = None;
            self.unchanged_polls = 0;
            return false;
        }

        if self.last_count == Some(status.indexed_count) {
            self.unchanged_polls += 1;
        } else {
            self.last_count = Some(status.indexed_count);
            self.unchanged_polls = 0;
        }
        self.unchanged_polls >= self.threshold
    }
}
