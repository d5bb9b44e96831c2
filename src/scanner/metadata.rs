use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

use super::{gps, hashing};
use crate::db::PhotoMetadata;
use crate::error::ExtractError;

/// EXIF date format, e.g. `2006:01:02 15:04:05`.
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Raw embedded metadata as the reader found it. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    pub capture_timestamp: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    /// Sexagesimal form: `"deg/1 min/1 sec/100"`.
    pub gps_latitude_raw: Option<String>,
    pub gps_latitude_ref: Option<String>,
    pub gps_longitude_raw: Option<String>,
    pub gps_longitude_ref: Option<String>,
}

/// Source of embedded photo metadata.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<EmbeddedMetadata>;
}

/// Reads EXIF from JPEG, HEIF, PNG and WebP containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataReader;

impl MetadataReader for ExifMetadataReader {
    fn read(&self, path: &Path) -> Result<EmbeddedMetadata> {
        let file = File::open(path)?;
        let mut bufreader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut bufreader)?;

        let ascii = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .and_then(|field| ascii_value(&field.value))
        };
        let rationals = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .and_then(|field| rational_triplet(&field.value))
        };

        Ok(EmbeddedMetadata {
            capture_timestamp: ascii(exif::Tag::DateTimeOriginal),
            camera_make: ascii(exif::Tag::Make),
            camera_model: ascii(exif::Tag::Model),
            gps_latitude_raw: rationals(exif::Tag::GPSLatitude),
            gps_latitude_ref: ascii(exif::Tag::GPSLatitudeRef),
            gps_longitude_raw: rationals(exif::Tag::GPSLongitude),
            gps_longitude_ref: ascii(exif::Tag::GPSLongitudeRef),
        })
    }
}

fn ascii_value(value: &exif::Value) -> Option<String> {
    let exif::Value::Ascii(parts) = value else {
        return None;
    };
    let text = String::from_utf8_lossy(parts.first()?)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn rational_triplet(value: &exif::Value) -> Option<String> {
    match value {
        exif::Value::Rational(v) if v.len() >= 3 => Some(
            v[..3]
                .iter()
                .map(|r| format!("{}/{}", r.num, r.denom))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

/// Build a record for `path`.
///
/// Only the filesystem stat can fail. Embedded metadata is best effort: a
/// failing reader or a missing/unparsable capture date falls back to the
/// file's modification time, and bad GPS strings leave the position unset.
pub fn extract_photo_metadata(
    path: &Path,
    reader: &dyn MetadataReader,
    calculate_hash: bool,
) -> Result<PhotoMetadata, ExtractError> {
    let file_info = std::fs::metadata(path).map_err(|source| ExtractError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let modified: DateTime<Utc> = file_info
        .modified()
        .map_err(|source| ExtractError::Stat {
            path: path.to_path_buf(),
            source,
        })?
        .into();

    let fallback_date = modified.with_timezone(&Local).naive_local();
    let mut metadata = PhotoMetadata::new(
        path.to_string_lossy(),
        fallback_date,
        modified,
        file_info.len(),
    );

    if calculate_hash {
        match hashing::calculate_md5(path) {
            Ok(hash) => metadata.file_hash = Some(hash),
            Err(e) => warn!("Error calculating hash for {}: {}", path.display(), e),
        }
    }

    let embedded = match reader.read(path) {
        Ok(embedded) => embedded,
        Err(e) => {
            debug!("No embedded metadata in {}: {}", path.display(), e);
            return Ok(metadata);
        }
    };

    metadata.camera_model = camera_model(&embedded);

    if let Some(taken) = embedded.capture_timestamp.as_deref().and_then(parse_capture_timestamp) {
        metadata.set_taken_date(taken);
    }

    if let (Some(lat), Some(lon)) = (&embedded.gps_latitude_raw, &embedded.gps_longitude_raw) {
        match gps::parse_coordinate(lat) {
            Ok(value) => {
                metadata.gps_lat = gps::apply_hemisphere(value, embedded.gps_latitude_ref.as_deref())
            }
            Err(e) => debug!("Bad GPS latitude in {}: {}", path.display(), e),
        }
        match gps::parse_coordinate(lon) {
            Ok(value) => {
                metadata.gps_lon = gps::apply_hemisphere(value, embedded.gps_longitude_ref.as_deref())
            }
            Err(e) => debug!("Bad GPS longitude in {}: {}", path.display(), e),
        }
    }

    Ok(metadata)
}

fn camera_model(embedded: &EmbeddedMetadata) -> String {
    [&embedded.camera_make, &embedded.camera_model]
        .into_iter()
        .filter_map(|part| part.as_deref().map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an EXIF capture timestamp. Returns `None` when unparsable.
pub fn parse_capture_timestamp(timestamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp.trim(), EXIF_DATE_FORMAT).ok()
}
