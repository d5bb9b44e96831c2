//! Transactional key/value store organised into named buckets.
//!
//! The store is a single SQLite file. Every read or write runs inside one
//! SQLite transaction, so a closure passed to [`Database::update`] either
//! lands completely or not at all. Photo records and the two date indices are
//! written through [`photos`], the indexing stats singleton through [`stats`].

mod schema;
pub mod photos;
pub mod stats;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

pub use photos::PhotoMetadata;
pub use schema::{
    BUCKET_DATE_INDEX, BUCKET_INDEXING_STATS, BUCKET_PHOTO_METADATA, BUCKET_YEAR_DATE_INDEX,
};
pub use stats::IndexingStats;

/// How long a writer waits on a file lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only closure against a consistent snapshot.
    pub fn view<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Tx<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        // Dropping the transaction rolls it back; nothing was written anyway.
        f(&Tx { conn: &tx })
    }

    /// Run a read-modify-write closure. Commits on `Ok`, rolls back on `Err`.
    pub fn update<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Tx<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&Tx { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// A running transaction.
pub struct Tx<'a> {
    conn: &'a Connection,
}

impl<'a> Tx<'a> {
    /// Look up an existing bucket.
    pub fn bucket(&self, name: &str) -> StoreResult<Bucket<'a>> {
        let exists = self
            .conn
            .query_row("SELECT 1 FROM buckets WHERE name = ?", [name], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::BucketNotFound(name.to_string()));
        }
        Ok(Bucket {
            conn: self.conn,
            name: name.to_string(),
        })
    }

    pub fn create_bucket_if_not_exists(&self, name: &str) -> StoreResult<Bucket<'a>> {
        self.conn
            .execute("INSERT OR IGNORE INTO buckets (name) VALUES (?)", [name])?;
        Ok(Bucket {
            conn: self.conn,
            name: name.to_string(),
        })
    }

    /// Drop every entry of a bucket, creating the bucket if it is missing.
    pub fn clear_bucket(&self, name: &str) -> StoreResult<Bucket<'a>> {
        let bucket = self.create_bucket_if_not_exists(name)?;
        self.conn
            .execute("DELETE FROM entries WHERE bucket = ?", [name])?;
        Ok(bucket)
    }
}

/// Handle on one bucket inside a transaction.
pub struct Bucket<'a> {
    conn: &'a Connection,
    name: String,
}

impl Bucket<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM entries WHERE bucket = ?1 AND key = ?2")?;
        let value = stmt
            .query_row(rusqlite::params![self.name, key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)
            ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value
            "#,
        )?;
        stmt.execute(rusqlite::params![self.name, key, value])?;
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM entries WHERE bucket = ?1 AND key = ?2")?;
        let removed = stmt.execute(rusqlite::params![self.name, key])?;
        Ok(removed > 0)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key FROM entries WHERE bucket = ? ORDER BY key")?;
        let keys = stmt
            .query_map([&self.name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn len(&self) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE bucket = ?",
            [&self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes)
    }
}

#[cfg(test)]
pub(crate) fn open_temp() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("index.db")).unwrap();
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bucket_is_an_error() {
        let (_dir, db) = open_temp();
        let err = db.view(|tx| tx.bucket("nope").map(|_| ())).unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_put_get_delete() {
        let (_dir, db) = open_temp();
        db.update(|tx| {
            let b = tx.create_bucket_if_not_exists("b")?;
            b.put("k1", b"one")?;
            b.put("k2", b"two")?;
            b.put("k1", b"uno")
        })
        .unwrap();

        let (value, keys) = db
            .view(|tx| {
                let b = tx.bucket("b")?;
                Ok((b.get("k1")?, b.keys()?))
            })
            .unwrap();
        assert_eq!(value.as_deref(), Some(&b"uno"[..]));
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);

        let removed = db.update(|tx| tx.bucket("b")?.delete("k1")).unwrap();
        assert!(removed);
        let again = db.update(|tx| tx.bucket("b")?.delete("k1")).unwrap();
        assert!(!again);
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let (_dir, db) = open_temp();
        db.update(|tx| tx.create_bucket_if_not_exists("b").map(|_| ()))
            .unwrap();

        let result: StoreResult<()> = db.update(|tx| {
            tx.bucket("b")?.put("k", b"v")?;
            tx.bucket("missing")?;
            Ok(())
        });
        assert!(result.is_err());

        let value = db.view(|tx| tx.bucket("b")?.get("k")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_clear_bucket_keeps_other_buckets() {
        let (_dir, db) = open_temp();
        db.update(|tx| {
            tx.create_bucket_if_not_exists("a")?.put("x", b"1")?;
            tx.create_bucket_if_not_exists("b")?.put("y", b"2")
        })
        .unwrap();

        db.update(|tx| tx.clear_bucket("a").map(|_| ())).unwrap();

        let (a_len, b_len) = db
            .view(|tx| Ok((tx.bucket("a")?.len()?, tx.bucket("b")?.len()?)))
            .unwrap();
        assert_eq!(a_len, 0);
        assert_eq!(b_len, 1);
    }

    #[test]
    fn test_json_values() {
        let (_dir, db) = open_temp();
        db.update(|tx| {
            tx.create_bucket_if_not_exists("b")?
                .put_json("list", &vec!["a".to_string(), "b".to_string()])
        })
        .unwrap();
        let list: Option<Vec<String>> = db.view(|tx| tx.bucket("b")?.get_json("list")).unwrap();
        assert_eq!(list, Some(vec!["a".to_string(), "b".to_string()]));
    }
}
