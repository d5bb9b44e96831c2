//! The body of one indexing run: discovery, fan-out, cleanup.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::pool;
use super::{RunMode, RunSummary};
use crate::db::Database;
use crate::error::{IndexError, StoreError};
use crate::scanner::{discover_images, extract_photo_metadata, needs_indexing, FileFingerprint, MetadataReader};

/// Log a progress line every this many indexed files.
const PROGRESS_EVERY: u64 = 500;

pub(crate) struct ScanJob {
    pub db: Arc<Database>,
    pub reader: Arc<dyn MetadataReader>,
    pub extensions: Arc<[String]>,
    pub root: PathBuf,
    pub worker_count: usize,
    pub mode: RunMode,
}

enum FileOutcome {
    Indexed,
    Skipped,
}

#[derive(Default)]
struct Counters {
    indexed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl ScanJob {
    pub fn run(self) -> Result<RunSummary, IndexError> {
        info!(
            "Starting {} indexing of photos in {}",
            self.mode,
            self.root.display()
        );

        if !self.root.is_dir() {
            return Err(IndexError::LibraryUnavailable(self.root.clone()));
        }

        let discovery = discover_images(&self.root, &self.extensions);
        let photos = discovery.images;
        info!("Found {} photos to index", photos.len());
        if discovery.walk_errors > 0 {
            warn!(
                "{} entries under {} could not be read",
                discovery.walk_errors,
                self.root.display()
            );
        }

        let stats = self
            .db
            .update_stats(|s| s.total_count = Some(photos.len() as u64))?;
        let last_indexed = if self.mode.force_all() {
            None
        } else {
            stats.last_indexed_time
        };
        let calculate_hashes = stats.calculate_file_hashes;

        let counters = Counters::default();
        let panicked = pool::run_bounded(photos.iter(), self.worker_count, |path| {
            match self.index_file(path, last_indexed, calculate_hashes) {
                Ok(FileOutcome::Indexed) => {
                    counters.indexed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(FileOutcome::Skipped) => {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!("Error indexing {}: {:#}", path.display(), e);
                }
            }
        });
        if panicked > 0 {
            error!("{} indexing worker(s) panicked", panicked);
        }

        // A partial walk would look like mass deletion.
        let removed = if !self.mode.cleanup_deleted() {
            0
        } else if discovery.walk_errors > 0 {
            warn!("Skipping cleanup of deleted files, the library walk was incomplete");
            0
        } else {
            info!("Cleaning up deleted files from index");
            self.cleanup_deleted(&photos)?
        };

        let summary = RunSummary {
            discovered: photos.len(),
            indexed: counters.indexed.into_inner(),
            skipped: counters.skipped.into_inner(),
            failed: counters.failed.into_inner(),
            removed,
            walk_errors: discovery.walk_errors,
        };
        info!(
            "Indexing completed: {} indexed, {} unchanged, {} failed, {} removed",
            summary.indexed, summary.skipped, summary.failed, summary.removed
        );
        Ok(summary)
    }

    fn index_file(
        &self,
        path: &Path,
        last_indexed: Option<DateTime<Utc>>,
        calculate_hashes: bool,
    ) -> Result<FileOutcome> {
        let key = path.to_string_lossy();

        let existing = if self.mode.force_all() {
            None
        } else {
            self.db.get_photo_metadata(&key)?
        };

        if let Some(stored) = &existing {
            let fingerprint = FileFingerprint::of(path)?;
            if !needs_indexing(Some(stored), &fingerprint, last_indexed) {
                debug!("Unchanged, skipping {}", path.display());
                return Ok(FileOutcome::Skipped);
            }
        }

        let mut metadata = extract_photo_metadata(path, self.reader.as_ref(), calculate_hashes)?;

        // Keep a hash computed by an earlier run while hashing is off.
        if let Some(stored) = existing {
            if !calculate_hashes && metadata.file_hash.is_none() {
                metadata.file_hash = stored.file_hash;
            }
        }

        let indexed_count = self.db.index_photo(&metadata)?;
        if indexed_count % PROGRESS_EVERY == 0 {
            info!("Indexed {} photos so far", indexed_count);
        }
        Ok(FileOutcome::Indexed)
    }

    /// Remove every indexed path that the current walk did not find.
    fn cleanup_deleted(&self, discovered: &[PathBuf]) -> Result<usize, StoreError> {
        let current: HashSet<String> = discovered
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut removed = 0;
        for path in self.db.indexed_paths()? {
            if current.contains(&path) {
                continue;
            }
            match self.db.remove_photo_from_index(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Error removing deleted file {} from index: {}", path, e),
            }
        }

        info!("Removed {} deleted files from index", removed);
        Ok(removed)
    }
}
