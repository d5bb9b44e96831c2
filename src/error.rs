//! Typed errors for the store, the extractor and the indexing engine.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the metadata store. Always propagated to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket {0} not found")]
    BucketNotFound(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Malformed GPS coordinate strings.
#[derive(Debug, Error, PartialEq)]
pub enum GpsParseError {
    #[error("invalid GPS coordinate format: {0}")]
    InvalidCoordinate(String),

    #[error("invalid fraction format: {0}")]
    InvalidFraction(String),

    #[error("zero denominator in fraction: {0}")]
    ZeroDenominator(String),
}

/// Per-file extraction failures. Logged by the engine, never escalated.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("error getting file info for {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the indexing engine's orchestration layer.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("indexing is already active, please wait for it to complete")]
    AlreadyActive,

    #[error("photo library {0} is missing or unreadable")]
    LibraryUnavailable(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn indexing thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("indexing run panicked")]
    Panicked,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
