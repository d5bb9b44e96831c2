//! Photo metadata indexing for "on this day" lookups.
//!
//! [`Indexer`] walks a photo library and stores one [`PhotoMetadata`] record
//! per image in a SQLite-backed [`Database`], together with a `MM-DD` and a
//! `YYYY-MM-DD` index. [`PhotoQuery`] answers date lookups from those indices
//! and [`StatusReporter`] exposes progress of the current run.

pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod query;
pub mod scanner;
pub mod status;

pub use config::Config;
pub use db::{Database, IndexingStats, PhotoMetadata};
pub use error::{IndexError, StoreError};
pub use indexer::{Indexer, RunHandle, RunMode, RunState, RunSummary};
pub use query::PhotoQuery;
pub use status::{format_duration, IndexingStatus, StatusReporter, StuckRunDetector};
