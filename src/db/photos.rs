//! Photo records and the two date indices derived from them.
//!
//! `PhotoMetadata` is keyed by path. Each record is also listed under its
//! `MM-DD` key in the date index and its `YYYY-MM-DD` key in the year-date
//! index. Every function here touches all three inside one transaction.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::{
    BUCKET_DATE_INDEX, BUCKET_INDEXING_STATS, BUCKET_PHOTO_METADATA, BUCKET_YEAR_DATE_INDEX,
    PHOTO_BUCKETS,
};
use super::stats::{read_stats, write_stats};
use super::{Bucket, Database, Tx};
use crate::error::StoreResult;

/// Everything the index knows about one photo file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub path: String,
    pub taken_date: NaiveDateTime,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub camera_model: String,
    /// `0.0` when the photo carries no usable GPS position.
    #[serde(default)]
    pub gps_lat: f64,
    #[serde(default)]
    pub gps_lon: f64,
    pub indexed_at: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
}

impl PhotoMetadata {
    /// A record with only the filesystem fingerprint and a capture date.
    pub fn new(
        path: impl Into<String>,
        taken_date: NaiveDateTime,
        modified_time: DateTime<Utc>,
        file_size: u64,
    ) -> Self {
        Self {
            path: path.into(),
            taken_date,
            year: taken_date.year(),
            month: taken_date.month(),
            day: taken_date.day(),
            camera_model: String::new(),
            gps_lat: 0.0,
            gps_lon: 0.0,
            indexed_at: Utc::now(),
            modified_time,
            file_size,
            file_hash: None,
        }
    }

    /// Replace the capture date, keeping year/month/day in sync with it.
    pub fn set_taken_date(&mut self, taken_date: NaiveDateTime) {
        self.taken_date = taken_date;
        self.year = taken_date.year();
        self.month = taken_date.month();
        self.day = taken_date.day();
    }

    pub fn date_key(&self) -> String {
        date_key(self.month, self.day)
    }

    pub fn year_date_key(&self) -> String {
        year_date_key(self.year, self.month, self.day)
    }

    pub fn has_gps(&self) -> bool {
        self.gps_lat != 0.0 || self.gps_lon != 0.0
    }
}

/// Date index key: `MM-DD`.
pub fn date_key(month: u32, day: u32) -> String {
    format!("{:02}-{:02}", month, day)
}

/// Year-date index key: `YYYY-MM-DD`.
pub fn year_date_key(year: i32, month: u32, day: u32) -> String {
    format!("{:04}-{:02}-{:02}", year, month, day)
}

impl Database {
    /// Create the photo partitions and the default stats record. Idempotent.
    pub fn init_photo_metadata(&self) -> StoreResult<()> {
        self.update(|tx| {
            for name in PHOTO_BUCKETS {
                tx.create_bucket_if_not_exists(name)?;
            }
            let stats = tx.bucket(BUCKET_INDEXING_STATS)?;
            if stats.is_empty()? {
                write_stats(tx, &Default::default())?;
            }
            Ok(())
        })
    }

    /// Store a record and move its path to the matching index entries.
    pub fn save_photo_metadata(&self, metadata: &PhotoMetadata) -> StoreResult<()> {
        self.update(|tx| write_photo(tx, metadata))
    }

    /// Store a record and bump `indexed_count` in the same transaction.
    pub fn index_photo(&self, metadata: &PhotoMetadata) -> StoreResult<u64> {
        self.update(|tx| {
            write_photo(tx, metadata)?;
            let mut stats = read_stats(tx)?;
            stats.indexed_count += 1;
            write_stats(tx, &stats)?;
            Ok(stats.indexed_count)
        })
    }

    /// Remove a photo from all three structures. Returns whether it was indexed.
    pub fn remove_photo_from_index(&self, path: &str) -> StoreResult<bool> {
        self.update(|tx| {
            let records = tx.bucket(BUCKET_PHOTO_METADATA)?;
            let Some(metadata) = records.get_json::<PhotoMetadata>(path)? else {
                return Ok(false);
            };

            remove_path(&tx.bucket(BUCKET_DATE_INDEX)?, &metadata.date_key(), path)?;
            remove_path(
                &tx.bucket(BUCKET_YEAR_DATE_INDEX)?,
                &metadata.year_date_key(),
                path,
            )?;
            records.delete(path)?;
            Ok(true)
        })
    }

    pub fn get_photo_metadata(&self, path: &str) -> StoreResult<Option<PhotoMetadata>> {
        self.view(|tx| tx.bucket(BUCKET_PHOTO_METADATA)?.get_json(path))
    }

    /// Every path that currently has a record.
    pub fn indexed_paths(&self) -> StoreResult<Vec<String>> {
        self.view(|tx| tx.bucket(BUCKET_PHOTO_METADATA)?.keys())
    }

    pub fn date_index_paths(&self, key: &str) -> StoreResult<Vec<String>> {
        self.view(|tx| read_paths(&tx.bucket(BUCKET_DATE_INDEX)?, key))
    }

    pub fn year_date_index_paths(&self, key: &str) -> StoreResult<Vec<String>> {
        self.view(|tx| read_paths(&tx.bucket(BUCKET_YEAR_DATE_INDEX)?, key))
    }

    /// Empty the record partition and both indices, and reset `indexed_count`.
    pub fn clear_all_indices(&self) -> StoreResult<()> {
        self.update(|tx| {
            for name in [
                BUCKET_PHOTO_METADATA,
                BUCKET_DATE_INDEX,
                BUCKET_YEAR_DATE_INDEX,
            ] {
                tx.clear_bucket(name)?;
            }
            let mut stats = read_stats(tx)?;
            stats.indexed_count = 0;
            write_stats(tx, &stats)
        })
    }
}

fn write_photo(tx: &Tx<'_>, metadata: &PhotoMetadata) -> StoreResult<()> {
    let records = tx.bucket(BUCKET_PHOTO_METADATA)?;
    let dates = tx.bucket(BUCKET_DATE_INDEX)?;
    let year_dates = tx.bucket(BUCKET_YEAR_DATE_INDEX)?;

    if let Some(previous) = records.get_json::<PhotoMetadata>(&metadata.path)? {
        remove_path(&dates, &previous.date_key(), &previous.path)?;
        remove_path(&year_dates, &previous.year_date_key(), &previous.path)?;
    }

    records.put_json(&metadata.path, metadata)?;
    add_path(&dates, &metadata.date_key(), &metadata.path)?;
    add_path(&year_dates, &metadata.year_date_key(), &metadata.path)
}

fn read_paths(bucket: &Bucket<'_>, key: &str) -> StoreResult<Vec<String>> {
    Ok(bucket.get_json::<Vec<String>>(key)?.unwrap_or_default())
}

fn add_path(bucket: &Bucket<'_>, key: &str, path: &str) -> StoreResult<()> {
    let mut paths = read_paths(bucket, key)?;
    if paths.iter().any(|p| p == path) {
        return Ok(());
    }
    paths.push(path.to_string());
    bucket.put_json(key, &paths)
}

fn remove_path(bucket: &Bucket<'_>, key: &str, path: &str) -> StoreResult<()> {
    let mut paths = read_paths(bucket, key)?;
    let before = paths.len();
    paths.retain(|p| p != path);
    if paths.len() == before {
        return Ok(());
    }
    if paths.is_empty() {
        bucket.delete(key)?;
        Ok(())
    } else {
        bucket.put_json(key, &paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;
    use chrono::NaiveDate;

    fn record(path: &str, y: i32, m: u32, d: u32) -> PhotoMetadata {
        let taken = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        PhotoMetadata::new(path, taken, Utc::now(), 100)
    }

    fn initialized() -> (tempfile::TempDir, Database) {
        let (dir, db) = open_temp();
        db.init_photo_metadata().unwrap();
        (dir, db)
    }

    #[test]
    fn test_keys_are_zero_padded() {
        let photo = record("/p/a.jpg", 2020, 6, 1);
        assert_eq!(photo.date_key(), "06-01");
        assert_eq!(photo.year_date_key(), "2020-06-01");
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_dir, db) = initialized();
        db.index_photo(&record("/p/a.jpg", 2020, 6, 1)).unwrap();
        db.init_photo_metadata().unwrap();
        assert_eq!(db.indexed_paths().unwrap(), vec!["/p/a.jpg".to_string()]);
        assert_eq!(db.indexing_stats().unwrap().indexed_count, 1);
    }

    #[test]
    fn test_save_updates_both_indices() {
        let (_dir, db) = initialized();
        db.save_photo_metadata(&record("/p/a.jpg", 2020, 6, 1)).unwrap();
        db.save_photo_metadata(&record("/p/b.jpg", 2021, 6, 1)).unwrap();

        assert_eq!(
            db.date_index_paths("06-01").unwrap(),
            vec!["/p/a.jpg".to_string(), "/p/b.jpg".to_string()]
        );
        assert_eq!(
            db.year_date_index_paths("2020-06-01").unwrap(),
            vec!["/p/a.jpg".to_string()]
        );
        assert_eq!(
            db.year_date_index_paths("2021-06-01").unwrap(),
            vec!["/p/b.jpg".to_string()]
        );
    }

    #[test]
    fn test_resave_does_not_duplicate() {
        let (_dir, db) = initialized();
        let photo = record("/p/a.jpg", 2020, 6, 1);
        db.save_photo_metadata(&photo).unwrap();
        db.save_photo_metadata(&photo).unwrap();
        assert_eq!(db.date_index_paths("06-01").unwrap().len(), 1);
        assert_eq!(db.year_date_index_paths("2020-06-01").unwrap().len(), 1);
    }

    #[test]
    fn test_resave_with_new_date_moves_index_entries() {
        let (_dir, db) = initialized();
        db.save_photo_metadata(&record("/p/a.jpg", 2020, 6, 1)).unwrap();
        db.save_photo_metadata(&record("/p/a.jpg", 2019, 7, 2)).unwrap();

        assert!(db.date_index_paths("06-01").unwrap().is_empty());
        assert!(db.year_date_index_paths("2020-06-01").unwrap().is_empty());
        assert_eq!(db.date_index_paths("07-02").unwrap(), vec!["/p/a.jpg".to_string()]);
        assert_eq!(
            db.year_date_index_paths("2019-07-02").unwrap(),
            vec!["/p/a.jpg".to_string()]
        );
    }

    #[test]
    fn test_remove_strips_all_structures() {
        let (_dir, db) = initialized();
        db.save_photo_metadata(&record("/p/a.jpg", 2020, 6, 1)).unwrap();
        db.save_photo_metadata(&record("/p/b.jpg", 2020, 6, 1)).unwrap();

        assert!(db.remove_photo_from_index("/p/a.jpg").unwrap());
        assert!(db.get_photo_metadata("/p/a.jpg").unwrap().is_none());
        assert_eq!(db.date_index_paths("06-01").unwrap(), vec!["/p/b.jpg".to_string()]);

        assert!(db.remove_photo_from_index("/p/b.jpg").unwrap());
        let empty_key_gone = db
            .view(|tx| tx.bucket(BUCKET_DATE_INDEX)?.get("06-01"))
            .unwrap()
            .is_none();
        assert!(empty_key_gone);

        // Removing again is a no-op.
        assert!(!db.remove_photo_from_index("/p/b.jpg").unwrap());
    }

    #[test]
    fn test_clear_all_indices_resets_count() {
        let (_dir, db) = initialized();
        db.index_photo(&record("/p/a.jpg", 2020, 6, 1)).unwrap();
        db.clear_all_indices().unwrap();

        assert!(db.indexed_paths().unwrap().is_empty());
        assert!(db.date_index_paths("06-01").unwrap().is_empty());
        assert_eq!(db.indexing_stats().unwrap().indexed_count, 0);
    }

    #[test]
    fn test_record_roundtrips_through_store() {
        let (_dir, db) = initialized();
        let mut photo = record("/p/a.jpg", 2020, 6, 1);
        photo.camera_model = "Canon EOS 5D".to_string();
        photo.gps_lat = 55.75;
        photo.file_hash = Some("abc".to_string());
        db.save_photo_metadata(&photo).unwrap();
        assert_eq!(db.get_photo_metadata("/p/a.jpg").unwrap(), Some(photo));
    }
}
