use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Thumbnail directory Synology DSM drops next to every photo folder.
const THUMBNAIL_DIR: &str = "@eaDir";

fn is_thumbnail_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == THUMBNAIL_DIR
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.to_lowercase() == ext))
}

/// Result of one walk over the library.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Image files, sorted by path.
    pub images: Vec<PathBuf>,
    /// Entries the walk could not read, the root included. Non-zero means
    /// `images` may be missing files that still exist.
    pub walk_errors: usize,
}

impl Discovery {
    pub fn is_complete(&self) -> bool {
        self.walk_errors == 0
    }
}

/// Every image file under `directory`.
///
/// Extensions are matched case-insensitively and `@eaDir` trees are skipped
/// entirely. Unreadable entries are logged and counted in `walk_errors`.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Discovery {
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_thumbnail_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", directory.display(), e);
                discovery.walk_errors += 1;
                continue;
            }
        };

        if entry.file_type().is_file() && has_image_extension(entry.path(), extensions) {
            discovery.images.push(entry.into_path());
        }
    }

    // Sort by path for consistent ordering
    discovery.images.sort();

    discovery
}
