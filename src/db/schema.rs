pub const SCHEMA: &str = r#"
-- Named partitions ("buckets")
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY
);

-- Key/value entries, one row per key within a bucket
CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (bucket, key)
);
"#;

pub const BUCKET_PHOTO_METADATA: &str = "PhotoMetadata";
pub const BUCKET_DATE_INDEX: &str = "DateIndex";
pub const BUCKET_YEAR_DATE_INDEX: &str = "YearDateIndex";
pub const BUCKET_INDEXING_STATS: &str = "IndexingStats";

/// The single key of the stats record inside [`BUCKET_INDEXING_STATS`].
pub const KEY_STATS: &str = "stats";

/// Partitions created by `init_photo_metadata`.
pub const PHOTO_BUCKETS: [&str; 4] = [
    BUCKET_PHOTO_METADATA,
    BUCKET_DATE_INDEX,
    BUCKET_YEAR_DATE_INDEX,
    BUCKET_INDEXING_STATS,
];
