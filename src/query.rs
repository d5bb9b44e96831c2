//! Date lookups against the secondary indices.

use chrono::{Datelike, Local, NaiveDate};
use rand::seq::SliceRandom;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::db::photos::{date_key, year_date_key};
use crate::db::{Database, PhotoMetadata};
use crate::error::StoreResult;

/// Bounds on how many photos one random pick returns.
pub const RANDOM_PHOTO_COUNT: RangeInclusive<usize> = 1..=10;

pub struct PhotoQuery {
    db: Arc<Database>,
}

impl PhotoQuery {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Up to `limit` photos taken on today's month and day, in any year.
    pub fn photos_from_this_day(&self, limit: usize) -> StoreResult<Vec<PathBuf>> {
        self.photos_on_day(Local::now().date_naive(), limit)
    }

    pub fn photos_on_day(&self, date: NaiveDate, limit: usize) -> StoreResult<Vec<PathBuf>> {
        let key = date_key(date.month(), date.day());
        let paths = self.db.date_index_paths(&key)?;
        debug!("{} photos indexed for {}", paths.len(), key);
        Ok(sample(paths, limit))
    }

    /// Up to `limit` photos taken on today's date `years_ago` years back.
    pub fn photos_from_past(&self, years_ago: u32, limit: usize) -> StoreResult<Vec<PathBuf>> {
        self.photos_years_before(Local::now().date_naive(), years_ago, limit)
    }

    pub fn photos_years_before(
        &self,
        date: NaiveDate,
        years_ago: u32,
        limit: usize,
    ) -> StoreResult<Vec<PathBuf>> {
        // Years before the calendar's range match nothing.
        let Some(year) = i32::try_from(years_ago)
            .ok()
            .and_then(|years| date.year().checked_sub(years))
        else {
            return Ok(Vec::new());
        };
        // Feb 29 of a non-leap target year simply has no key.
        let key = year_date_key(year, date.month(), date.day());
        let paths = self.db.year_date_index_paths(&key)?;
        debug!("{} photos indexed for {}", paths.len(), key);
        Ok(sample(paths, limit))
    }

    /// `count` indexed photos picked uniformly at random, without repeats.
    /// `count` is clamped to [`RANDOM_PHOTO_COUNT`].
    pub fn random_photos(&self, count: usize) -> StoreResult<Vec<PathBuf>> {
        let count = count.clamp(*RANDOM_PHOTO_COUNT.start(), *RANDOM_PHOTO_COUNT.end());
        let paths = self.db.indexed_paths()?;
        debug!("Picking {} of {} indexed photos", count, paths.len());
        Ok(paths
            .choose_multiple(&mut rand::thread_rng(), count)
            .map(PathBuf::from)
            .collect())
    }

    /// The stored record for `path`, if it has been indexed.
    ///
    /// Records are keyed by the path discovery produced under the library
    /// root, symlinks unresolved, so `path` is matched literally. A relative
    /// path is also tried against the current directory.
    pub fn photo_info(&self, path: &Path) -> StoreResult<Option<PhotoMetadata>> {
        if let Some(info) = self.db.get_photo_metadata(&path.to_string_lossy())? {
            return Ok(Some(info));
        }
        match std::path::absolute(path) {
            Ok(absolute) if absolute != path => {
                self.db.get_photo_metadata(&absolute.to_string_lossy())
            }
            _ => Ok(None),
        }
    }
}

/// Uniform random subset of at most `limit` paths.
fn sample(mut paths: Vec<String>, limit: usize) -> Vec<PathBuf> {
    if paths.len() > limit {
        paths.shuffle(&mut rand::thread_rng());
        paths.truncate(limit);
    }
    paths.into_iter().map(PathBuf::from).collect()
}
