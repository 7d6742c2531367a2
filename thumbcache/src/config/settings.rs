//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::key::KeyAlgorithm;
use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Cache tier settings
    pub cache: CacheSettings,
    /// Worker pool and HTTP settings
    pub fetch: FetchSettings,
    /// Decode settings
    pub decode: DecodeSettings,
    /// Cache key derivation
    pub keys: KeySettings,
    /// Catalog source
    pub catalog: CatalogSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Disk cache directory
    pub directory: PathBuf,
    /// Memory cache size in bytes
    pub memory_size: usize,
    /// Disk cache size in bytes
    pub disk_size: u64,
}

/// Fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Worker pool size
    pub workers: usize,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// `host:port` checked before each fetch; `None` skips the check
    pub probe_address: Option<String>,
}

/// Decode configuration. A zero dimension disables downsampling.
#[derive(Debug, Clone)]
pub struct DecodeSettings {
    pub max_width: u32,
    pub max_height: u32,
}

/// Key derivation configuration.
#[derive(Debug, Clone)]
pub struct KeySettings {
    pub algorithm: KeyAlgorithm,
}

/// Catalog configuration.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// URL of the JSON image catalog
    pub url: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Directory holding the log file
    pub directory: PathBuf,
}
