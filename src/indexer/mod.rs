//! Indexing engine.
//!
//! An [`Indexer`] owns the run-lock: an in-memory [`RunState`] behind a mutex,
//! checked together with the persisted `active` flag when a run starts. The
//! lock is only held to decide whether a run may start and to flip the state
//! back at the end; the scan itself runs on its own thread without it.

pub mod pool;
mod run;

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::{IndexError, StoreError};
use crate::scanner::{ExifMetadataReader, MetadataReader};
use run::ScanJob;

/// Worker count used when the caller has no preference.
pub const DEFAULT_WORKER_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Index new files and re-extract stale ones.
    Lazy,
    /// Clear everything, then index every file.
    Full,
    /// Like `Lazy`, then drop records of files that no longer exist.
    Differential,
}

impl RunMode {
    pub fn force_all(self) -> bool {
        self == RunMode::Full
    }

    pub fn cleanup_deleted(self) -> bool {
        self == RunMode::Differential
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Lazy => "lazy",
            RunMode::Full => "full",
            RunMode::Differential => "differential",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Scanning,
}

/// Outcome counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
    /// Unreadable entries met during discovery. Cleanup is skipped when non-zero.
    pub walk_errors: usize,
}

/// Handle on a run in progress. Dropping it detaches the run.
pub struct RunHandle {
    mode: RunMode,
    handle: JoinHandle<Result<RunSummary, IndexError>>,
}

impl RunHandle {
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the run has finished and the engine is idle again.
    pub fn wait(self) -> Result<RunSummary, IndexError> {
        self.handle.join().map_err(|_| IndexError::Panicked)?
    }
}

pub struct Indexer {
    db: Arc<Database>,
    reader: Arc<dyn MetadataReader>,
    extensions: Arc<[String]>,
    state: Arc<Mutex<RunState>>,
}

impl Indexer {
    /// An engine that reads EXIF with `kamadak-exif`.
    pub fn new(db: Arc<Database>, extensions: Vec<String>) -> Self {
        Self::with_reader(db, extensions, Arc::new(ExifMetadataReader))
    }

    pub fn with_reader(
        db: Arc<Database>,
        extensions: Vec<String>,
        reader: Arc<dyn MetadataReader>,
    ) -> Self {
        Self {
            db,
            reader,
            extensions: extensions.into(),
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }

    pub fn state(&self) -> RunState {
        *lock_state(&self.state)
    }

    /// Lazy scan: index new files and re-extract changed ones.
    pub fn start_background_indexing(
        &self,
        root: impl Into<PathBuf>,
        worker_count: usize,
    ) -> Result<RunHandle, IndexError> {
        self.start(root, worker_count, RunMode::Lazy)
    }

    /// Clear all indices and index every file again.
    pub fn force_reindexing(
        &self,
        root: impl Into<PathBuf>,
        worker_count: usize,
    ) -> Result<RunHandle, IndexError> {
        self.start(root, worker_count, RunMode::Full)
    }

    /// Lazy scan followed by removal of files that disappeared from disk.
    pub fn start_differential_indexing(
        &self,
        root: impl Into<PathBuf>,
        worker_count: usize,
    ) -> Result<RunHandle, IndexError> {
        self.start(root, worker_count, RunMode::Differential)
    }

    /// Startup recovery. A persisted `active` flag seen before this process
    /// started any run means the previous process died mid-scan; clear it.
    /// Returns whether the flag was reset.
    ///
    /// Files the crashed run never reached are picked up by the next lazy
    /// or differential run, but nothing records which ones those were.
    pub fn reset_indexing_flag_if_stuck(&self) -> Result<bool, IndexError> {
        let state = lock_state(&self.state);
        if *state == RunState::Scanning {
            return Ok(false);
        }
        if !self.db.indexing_stats()?.active {
            return Ok(false);
        }

        warn!("Detected active indexing flag at startup, previous run was likely interrupted");
        self.db.update_stats(|stats| stats.active = false)?;
        info!("Indexing flag reset");
        Ok(true)
    }

    pub fn enable_file_hashing(&self, enable: bool) -> Result<(), StoreError> {
        self.db
            .update_stats(|stats| stats.calculate_file_hashes = enable)?;
        Ok(())
    }

    pub fn is_file_hashing_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.db.indexing_stats()?.calculate_file_hashes)
    }

    /// Start a run in the given mode. The three named entry points above
    /// delegate here.
    pub fn start(
        &self,
        root: impl Into<PathBuf>,
        worker_count: usize,
        mode: RunMode,
    ) -> Result<RunHandle, IndexError> {
        let root = root.into();
        let guard = self.begin_run()?;

        if mode.force_all() {
            // On error the guard returns the engine to idle.
            self.db.clear_all_indices()?;
        }

        let job = ScanJob {
            db: Arc::clone(&self.db),
            reader: Arc::clone(&self.reader),
            extensions: Arc::clone(&self.extensions),
            root,
            worker_count,
            mode,
        };

        let handle = thread::Builder::new()
            .name(format!("indexer-{}", mode))
            .spawn(move || {
                let _guard = guard;
                job.run()
            })
            .map_err(IndexError::Spawn)?;

        Ok(RunHandle { mode, handle })
    }

    /// Idle → Scanning. Rejects the transition when a run is already active.
    fn begin_run(&self) -> Result<RunGuard, IndexError> {
        let mut state = lock_state(&self.state);
        if *state == RunState::Scanning {
            return Err(IndexError::AlreadyActive);
        }

        let started_at = Utc::now();
        if !self.db.mark_run_started(started_at)? {
            return Err(IndexError::AlreadyActive);
        }
        *state = RunState::Scanning;

        Ok(RunGuard {
            db: Arc::clone(&self.db),
            state: Arc::clone(&self.state),
            started_at,
        })
    }
}

/// Scanning → Idle when dropped, whether the run succeeded, failed or panicked.
struct RunGuard {
    db: Arc<Database>,
    state: Arc<Mutex<RunState>>,
    started_at: DateTime<Utc>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        match self.db.mark_run_finished(self.started_at) {
            Ok(stats) => info!(
                "Indexing run finished in {:.2} sec",
                stats.indexing_duration_seconds.unwrap_or_default()
            ),
            Err(e) => error!("Error resetting indexing active flag: {}", e),
        }
        *state = RunState::Idle;
    }
}

fn lock_state(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
