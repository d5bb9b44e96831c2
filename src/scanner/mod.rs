pub mod change_detection;
pub mod discovery;
pub mod gps;
pub mod hashing;
pub mod metadata;

pub use change_detection::{needs_indexing, FileFingerprint};
pub use discovery::{discover_images, Discovery};
pub use metadata::{extract_photo_metadata, EmbeddedMetadata, ExifMetadataReader, MetadataReader};
