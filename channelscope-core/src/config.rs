//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/channelscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/channelscope/` (~/.config/channelscope/)
//! - State/Logs: `$XDG_STATE_HOME/channelscope/` (~/.local/state/channelscope/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `upstream.api_key` is not set.
pub const API_KEY_ENV: &str = "CHANNELSCOPE_API_KEY";

/// Upper bound on messages requested per channel.
const MAX_MESSAGE_LIMIT: usize = 100;

/// File name prefix of the rolling log files in the state directory.
pub const LOG_FILE_PREFIX: &str = "channelscope.log";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Snapshot cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upstream channel-data source
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Seconds a snapshot stays fresh (0 disables caching)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Entry count above which expired entries are swept on insert
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    256
}

/// Which upstream implementation to use
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTTP channel-data gateway
    #[default]
    Gateway,
    /// JSON files on disk
    Fixture,
}

/// Upstream channel-data source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Source implementation
    #[serde(default)]
    pub source: SourceKind,

    /// Gateway base URL (e.g., `https://gateway.example.com`)
    pub server_url: Option<String>,

    /// Gateway API key (can also use the CHANNELSCOPE_API_KEY env var)
    pub api_key: Option<String>,

    /// HTTP and fetch timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Number of most recent messages to analyze
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    /// Directory of `<handle>.json` files for the fixture source
    pub fixture_dir: Option<PathBuf>,

    /// Where downloaded avatars are written
    pub avatar_dir: Option<PathBuf>,

    /// Download channel avatars on fresh fetches
    #[serde(default = "default_download_avatars")]
    pub download_avatars: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            server_url: None,
            api_key: None,
            timeout_secs: default_upstream_timeout(),
            message_limit: default_message_limit(),
            fixture_dir: None,
            avatar_dir: None,
            download_avatars: default_download_avatars(),
        }
    }
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_message_limit() -> usize {
    20
}

fn default_download_avatars() -> bool {
    true
}

impl UpstreamConfig {
    /// API key from config, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }

    /// Avatar directory, defaulting to `$XDG_STATE_HOME/channelscope/avatars`.
    pub fn resolved_avatar_dir(&self) -> PathBuf {
        self.avatar_dir.clone().unwrap_or_else(Config::avatar_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.message_limit == 0 || self.message_limit > MAX_MESSAGE_LIMIT {
            return Err(Error::Config(format!(
                "upstream.message_limit must be between 1 and {}",
                MAX_MESSAGE_LIMIT
            )));
        }

        match self.source {
            SourceKind::Gateway => {
                if self.server_url.is_none() {
                    return Err(Error::Config(
                        "upstream.server_url is required for the gateway source".to_string(),
                    ));
                }
                if self.resolved_api_key().is_none() {
                    return Err(Error::Config(format!(
                        "upstream.api_key (or {}) is required for the gateway source",
                        API_KEY_ENV
                    )));
                }
            }
            SourceKind::Fixture => {
                if self.fixture_dir.is_none() {
                    return Err(Error::Config(
                        "upstream.fixture_dir is required for the fixture source".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/channelscope/config.toml` (~/.config/channelscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("channelscope").join("config.toml")
    }

    /// Returns the state directory path (for logs and avatars)
    ///
    /// `$XDG_STATE_HOME/channelscope/` (~/.local/state/channelscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("channelscope")
    }

    /// Returns the log file prefix path
    ///
    /// Logs rotate daily, so the files on disk carry a `.YYYY-MM-DD` suffix
    /// (see [`crate::logging::log_file_path`]).
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(LOG_FILE_PREFIX)
    }

    /// Returns the default avatar download directory
    pub fn avatar_dir() -> PathBuf {
        Self::state_dir().join("avatars")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.upstream.source, SourceKind::Gateway);
        assert_eq!(config.upstream.message_limit, 20);
        assert_eq!(config.upstream.timeout_secs, 30);
        assert!(config.upstream.download_avatars);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[cache]
ttl_secs = 60

[upstream]
source = "fixture"
fixture_dir = "/tmp/channels"
message_limit = 50

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.upstream.source, SourceKind::Fixture);
        assert_eq!(
            config.upstream.fixture_dir.as_deref(),
            Some(Path::new("/tmp/channels"))
        );
        assert_eq!(config.upstream.message_limit, 50);
        assert_eq!(config.logging.level, "debug");
        assert!(config.upstream.validate().is_ok());
    }

    #[test]
    fn test_upstream_validation() {
        // Gateway without a URL fails
        let config = UpstreamConfig::default();
        assert!(config.validate().is_err());

        let config = UpstreamConfig {
            server_url: Some("https://gateway.example.com".to_string()),
            api_key: Some("gw_test".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        // Fixture source needs a directory
        let config = UpstreamConfig {
            source: SourceKind::Fixture,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = UpstreamConfig {
            source: SourceKind::Fixture,
            fixture_dir: Some(PathBuf::from("/tmp")),
            message_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_avatar_dir_wins() {
        let config = UpstreamConfig {
            avatar_dir: Some(PathBuf::from("/var/tmp/avatars")),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_avatar_dir(),
            PathBuf::from("/var/tmp/avatars")
        );
    }
}
