//! Configuration file handling for ~/.thumbcache/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::DEFAULT_PROBE_TIMEOUT_MS;
use super::settings::ConfigFile;
use crate::blob::Dimensions;
use crate::cache::{DiskCacheConfig, MemoryCacheConfig};
use crate::fetch::FetchConfig;
use crate::loader::LoaderConfig;
use crate::origin::HttpOriginConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.thumbcache/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.thumbcache/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Write a default config file at `path` if none exists.
    ///
    /// Returns `true` if a file was created. An existing file is left as is.
    pub fn ensure_exists(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Render the configuration as it would be written to disk.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Build the loader configuration described by this file.
    pub fn to_loader_config(&self) -> LoaderConfig {
        let decode_hint = (self.decode.max_width > 0 && self.decode.max_height > 0)
            .then(|| Dimensions::new(self.decode.max_width, self.decode.max_height));

        LoaderConfig {
            memory: MemoryCacheConfig {
                max_size_bytes: self.cache.memory_size,
            },
            disk: DiskCacheConfig::new(self.cache.directory.clone(), self.cache.disk_size),
            fetch: FetchConfig {
                workers: self.fetch.workers,
            },
            http: HttpOriginConfig {
                timeout: Duration::from_secs(self.fetch.timeout_secs),
                connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
                user_agent: self.fetch.user_agent.clone(),
            },
            decode_hint,
            key_algorithm: self.keys.algorithm,
            probe_address: self.fetch.probe_address.clone(),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

/// Get the path to the config directory (~/.thumbcache).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".thumbcache")
}

/// Get the path to the config file (~/.thumbcache/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::key::KeyAlgorithm;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
        assert_eq!(config.cache.disk_size, DEFAULT_DISK_CACHE_SIZE);
        assert_eq!(config.fetch.workers, DEFAULT_FETCH_WORKERS);
        assert_eq!(config.fetch.timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(config.keys.algorithm, KeyAlgorithm::Sha256);
        assert!(config.catalog.url.is_none());
        assert!(config.cache.directory.ends_with("thumbnails"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        let default = ConfigFile::default();

        assert_eq!(config.fetch.workers, default.fetch.workers);
        assert_eq!(config.cache.memory_size, default.cache.memory_size);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        ConfigFile::default().save_to(&config_path).unwrap();
        assert!(config_path.exists());
    }

    #[test]
    fn test_ensure_exists_keeps_existing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        assert!(ConfigFile::ensure_exists(&config_path).unwrap());
        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded.fetch.workers, DEFAULT_FETCH_WORKERS);

        std::fs::write(&config_path, "[fetch]\nworkers = 2\n").unwrap();
        assert!(!ConfigFile::ensure_exists(&config_path).unwrap());
        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded.fetch.workers, 2);
    }

    #[test]
    fn test_to_loader_config() {
        let mut config = ConfigFile::default();
        config.cache.memory_size = 1024;
        config.cache.disk_size = 4096;
        config.fetch.workers = 3;
        config.fetch.timeout_secs = 7;
        config.decode.max_width = 100;
        config.decode.max_height = 50;
        config.keys.algorithm = KeyAlgorithm::Structural;
        config.fetch.probe_address = Some("127.0.0.1:1".to_string());

        let loader = config.to_loader_config();

        assert_eq!(loader.memory.max_size_bytes, 1024);
        assert_eq!(loader.disk.max_size_bytes, 4096);
        assert_eq!(loader.disk.directory, config.cache.directory);
        assert_eq!(loader.fetch.workers, 3);
        assert_eq!(loader.http.timeout, Duration::from_secs(7));
        assert_eq!(loader.decode_hint, Some(Dimensions::new(100, 50)));
        assert_eq!(loader.key_algorithm, KeyAlgorithm::Structural);
        assert_eq!(loader.probe_address.as_deref(), Some("127.0.0.1:1"));
    }

    #[test]
    fn test_zero_decode_dimension_disables_hint() {
        let mut config = ConfigFile::default();
        config.decode.max_width = 0;
        assert!(config.to_loader_config().decode_hint.is_none());
    }

    #[test]
    fn test_config_paths() {
        assert!(config_directory().ends_with(".thumbcache"));
        assert!(config_file_path().ends_with(".thumbcache/config.ini"));
    }
}
