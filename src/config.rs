//! Settings file handling
//!
//! The configuration lives in a small JSON file next to where the tool is run.
//! A missing file is replaced by a template the user has to edit before the next run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default location of the settings file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Base URL for the CoinGecko v3 API
pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Placeholder written into a freshly created config file
const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

/// Cache expiry written into a freshly created config file (one hour)
const DEFAULT_CACHE_EXPIRY_SECS: u64 = 3600;

/// Errors that stop the program before any fetching happens
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file did not exist; a template was written in its place
    #[error("{} not found. A default config file was created, please add your CoinGecko API key and rerun", .0.display())]
    CreatedDefault(PathBuf),

    /// The file exists but is not a valid configuration
    #[error("Invalid JSON in {}: {source}. Please check the file", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the file failed
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// User settings read once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// CoinGecko API key, sent as the `x-cg-api-key` header
    pub api_key: String,
    /// Maximum age of a cached snapshot, in seconds
    pub cache_expiry: u64,
    /// API base URL, only present in the file when overridden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Config {
    /// The template written when no config file exists
    pub fn default_template() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.to_string(),
            cache_expiry: DEFAULT_CACHE_EXPIRY_SECS,
            api_url: None,
        }
    }

    /// Loads the configuration from `path`
    ///
    /// # Returns
    /// * `Ok(Config)` if the file exists and parses
    /// * `Err(ConfigError::CreatedDefault)` if it was missing; the template has been written
    /// * `Err(ConfigError::Malformed)` if the content is not a valid configuration
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Self::write_default(path)?;
                return Err(ConfigError::CreatedDefault(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the default template to `path`, creating parent directories as needed
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&Self::default_template())
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(io_err)
    }

    /// Cache expiry as a `Duration`
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expiry)
    }

    /// API base URL, falling back to the public CoinGecko endpoint
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("config.json")
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);
        fs::write(&path, r#"{"api_key": "k", "cache_expiry": 3600}"#).unwrap();

        let config = Config::load(&path).expect("Config should load");

        assert_eq!(config.api_key, "k");
        assert_eq!(config.cache_expiry, 3600);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_missing_config_writes_default_and_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);

        let err = Config::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::CreatedDefault(_)));
        assert!(path.exists(), "Default config should be written");

        let written: Config =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).expect("Template should parse");
        assert_eq!(written, Config::default_template());
        assert_eq!(written.api_key, "YOUR_API_KEY");
        assert_eq!(written.cache_expiry, 3600);
    }

    #[test]
    fn test_second_load_after_default_succeeds() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);

        assert!(Config::load(&path).is_err());
        let config = Config::load(&path).expect("Template should load on rerun");
        assert_eq!(config, Config::default_template());
    }

    #[test]
    fn test_default_written_into_missing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("config.json");

        let err = Config::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::CreatedDefault(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_negative_cache_expiry_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);
        fs::write(&path, r#"{"api_key": "k", "cache_expiry": -5}"#).unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);
        fs::write(&path, r#"{"cache_expiry": 60}"#).unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_custom_api_url() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = config_path(&temp_dir);
        fs::write(
            &path,
            r#"{"api_key": "k", "cache_expiry": 0, "api_url": "http://localhost:8080"}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_url(), "http://localhost:8080");
        assert_eq!(config.cache_ttl(), Duration::ZERO);
    }
}
