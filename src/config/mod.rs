//! Configuration management for storyline.
//!
//! Configuration is read from `~/.config/storyline/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fetcher::client::BASE_API_URL;
use crate::fetcher::reconciler::DEFAULT_WORKERS;
use crate::fetcher::{CacheMode, StoryFilter};
use crate::scraper::ScraperConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncSettings,
    pub adblock: AdBlockConfig,
    pub scraper: ScraperConfig,
}

/// Remote content API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_API_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("storyline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Defaults applied to every sync job, including jobs replayed from the queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub connection_enabled: bool,
    pub article_enabled: bool,
    pub comments_enabled: bool,
    pub readability_enabled: bool,
    /// Fetch policy for items fetched by a sync job
    pub mode: CacheMode,
    /// Maximum item fetches in flight while syncing a comment tree
    pub workers: usize,
    /// Story list the daemon prefetches from
    pub prefetch_filter: StoryFilter,
    /// Number of stories the daemon queues from that list (0 = off)
    pub prefetch_count: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            connection_enabled: true,
            article_enabled: true,
            comments_enabled: true,
            readability_enabled: false,
            mode: CacheMode::CacheOnly,
            workers: DEFAULT_WORKERS,
            prefetch_filter: StoryFilter::Top,
            prefetch_count: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdBlockConfig {
    pub enabled: bool,
    /// Newline-delimited host list; defaults to `ad_hosts.txt` next to the config file
    pub hosts_file: Option<PathBuf>,
}

impl Default for AdBlockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hosts_file: None,
        }
    }
}

impl AdBlockConfig {
    pub fn hosts_path(&self) -> Option<PathBuf> {
        self.hosts_file.clone().or_else(|| {
            dirs::config_dir().map(|d| d.join("storyline").join("ad_hosts.txt"))
        })
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/storyline/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("storyline").join("config.toml"))
    }

    /// Get the default database path: `<data dir>/storyline/storyline.db`
    pub fn default_db_path() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir.join("storyline").join("storyline.db"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# storyline configuration
#
# Cache modes:
# - "default": revalidate cached responses with the server
# - "cache":   serve cached responses, hit the network only on a miss
# - "network": always download a fresh copy

[api]
base_url = "https://hacker-news.firebaseio.com/v0/"
timeout_secs = 30

[sync]
# Master switch; when off, sync jobs stay queued until it is turned back on
connection_enabled = true

# What a sync job downloads besides the item itself
article_enabled = true
comments_enabled = true
readability_enabled = false

mode = "cache"

# Maximum item fetches in flight while syncing a comment tree
workers = 8

# Stories the daemon queues for offline reading on every run (0 = off)
prefetch_filter = "top"
prefetch_count = 0

[adblock]
enabled = true
# hosts_file = "/path/to/ad_hosts.txt"

[scraper]
# Run browser in headless mode (no visible window)
headless = true

# Extraction timeout in seconds
timeout_secs = 30

# Wait time after page load for dynamic content (milliseconds)
wait_after_load_ms = 1000

# Minimum extracted text length worth keeping
min_content_length = 200
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.api.base_url, BASE_API_URL);
        assert_eq!(config.sync.mode, CacheMode::CacheOnly);
        assert_eq!(config.sync.workers, 8);
        assert!(!config.sync.readability_enabled);
        assert_eq!(config.scraper.timeout_secs, 30);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[sync]
article_enabled = false
mode = "network"
prefetch_filter = "best"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert!(!config.sync.article_enabled);
        assert_eq!(config.sync.mode, CacheMode::NetworkOnly);
        assert_eq!(config.sync.prefetch_filter, StoryFilter::Best);
        // Untouched fields keep their defaults
        assert!(config.sync.comments_enabled);
        assert!(config.adblock.enabled);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert!(config.sync.connection_enabled);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[sync]\nmode = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[adblock]\nhosts_file = \"/tmp/hosts\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.adblock.hosts_path(), Some(PathBuf::from("/tmp/hosts")));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
