use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "ONTHISDAY_CONFIG";
/// Environment variable overriding `photo_path`.
pub const PHOTO_PATH_ENV: &str = "ONTHISDAY_PHOTO_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the photo library to index.
    #[serde(default = "default_photo_path")]
    pub photo_path: PathBuf,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub memories: MemoriesConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoriesConfig {
    /// How many photos a lookup returns at most.
    #[serde(default = "default_photo_count")]
    pub photo_count: usize,
}

impl Default for MemoriesConfig {
    fn default() -> Self {
        Self {
            photo_count: default_photo_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between differential reindex passes.
    #[serde(default = "default_reindex_interval_secs")]
    pub reindex_interval_secs: u64,

    /// Poll interval of `status --watch`.
    #[serde(default = "default_status_poll_secs")]
    pub status_poll_secs: u64,

    /// Unchanged polls of an active run before it is treated as stuck.
    #[serde(default = "default_stuck_after_polls")]
    pub stuck_after_polls: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            reindex_interval_secs: default_reindex_interval_secs(),
            status_poll_secs: default_status_poll_secs(),
            stuck_after_polls: default_stuck_after_polls(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onthisday")
        .join("onthisday.db")
}

fn default_photo_path() -> PathBuf {
    PathBuf::from("/photoLibrary")
}

fn default_worker_count() -> usize {
    crate::indexer::DEFAULT_WORKER_COUNT
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "webp".to_string(),
        "gif".to_string(),
        "heic".to_string(),
    ]
}

fn default_photo_count() -> usize {
    5
}

fn default_reindex_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_status_poll_secs() -> u64 {
    5
}

fn default_stuck_after_polls() -> u32 {
    12
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            photo_path: default_photo_path(),
            indexer: IndexerConfig::default(),
            memories: MemoriesConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location, creating it with
    /// defaults when missing. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var_os(name));
        Ok(config)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<std::ffi::OsString>) {
        if let Some(photo_path) = var(PHOTO_PATH_ENV).filter(|v| !v.is_empty()) {
            self.photo_path = PathBuf::from(photo_path);
        }
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("onthisday")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.photo_path, PathBuf::from("/photoLibrary"));
        assert_eq!(config.indexer.worker_count, 2);
        assert_eq!(config.memories.photo_count, 5);
        assert_eq!(config.daemon.reindex_interval_secs, 86400);
        assert!(config.indexer.image_extensions.contains(&"heic".to_string()));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "photo_path = \"/srv/photos\"\n\n[indexer]\nworker_count = 8\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.photo_path, PathBuf::from("/srv/photos"));
        assert_eq!(config.indexer.worker_count, 8);
        assert_eq!(config.indexer.image_extensions.len(), 6);
        assert_eq!(config.daemon.stuck_after_polls, 12);
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.memories.photo_count = 9;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().memories.photo_count, 9);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "photo_path = [").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_photo_path_env_override() {
        let mut config = Config::default();
        config.apply_env(|name| (name == PHOTO_PATH_ENV).then(|| "/mnt/pics".into()));
        assert_eq!(config.photo_path, PathBuf::from("/mnt/pics"));

        let mut config = Config::default();
        config.apply_env(|_| Some("".into()));
        assert_eq!(config.photo_path, PathBuf::from("/photoLibrary"));
    }
}
