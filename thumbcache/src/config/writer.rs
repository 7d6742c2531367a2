//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let probe_address = config.fetch.probe_address.as_deref().unwrap_or("");
    let catalog_url = config.catalog.url.as_deref().unwrap_or("");

    format!(
        r#"[cache]
; Directory for the disk tier. Entries are stored as <key>.img
; If empty, defaults to the platform cache directory (e.g. ~/.cache/thumbcache/thumbnails)
directory = {}
; Memory tier budget for decoded images (default: 64MB)
; Supports: KB, MB, GB suffixes (e.g., 32MB, 256MB)
memory_size = {}
; Disk tier budget for encoded images (default: 50MB)
; Supports: KB, MB, GB suffixes (e.g., 50MB, 1GB)
disk_size = {}

[fetch]
; Number of concurrent fetch workers (default: 5)
workers = {}
; Whole-request timeout in seconds (default: 5)
timeout_secs = {}
; Connect timeout in seconds (default: 5)
connect_timeout_secs = {}
; User-Agent header sent to origins
user_agent = {}
; host:port checked before each network fetch so an offline host fails fast
; Leave empty to skip the check (e.g. probe_address = 1.1.1.1:443)
probe_address = {}

[decode]
; Decoded images are downsampled toward this size (power-of-two steps)
; Set either to 0 to keep full resolution
max_width = {}
max_height = {}

[keys]
; Cache key algorithm:
;   sha256     - SHA-256, 64 hex chars (default)
;   structural - FNV-1a 64-bit, 16 hex chars
algorithm = {}

[catalog]
; URL of the JSON image catalog used by `thumbcache catalog`
url = {}

[logging]
; Directory for thumbcache.log
directory = {}
"#,
        path_to_string(&config.cache.directory),
        format_size(config.cache.memory_size as u64),
        format_size(config.cache.disk_size),
        config.fetch.workers,
        config.fetch.timeout_secs,
        config.fetch.connect_timeout_secs,
        config.fetch.user_agent,
        probe_address,
        config.decode.max_width,
        config.decode.max_height,
        config.keys.algorithm,
        catalog_url,
        path_to_string(&config.logging.directory),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::defaults::*;
    use super::super::settings::ConfigFile;
    use super::*;
    use crate::key::KeyAlgorithm;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.directory = temp_dir.path().join("thumbs");
        config.cache.memory_size = 128 * 1024 * 1024;
        config.cache.disk_size = 2 * 1024 * 1024 * 1024;
        config.fetch.workers = 12;
        config.fetch.probe_address = Some("1.1.1.1:443".to_string());
        config.keys.algorithm = KeyAlgorithm::Structural;
        config.catalog.url = Some("https://example.com/images.json".to_string());

        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded.cache.directory, temp_dir.path().join("thumbs"));
        assert_eq!(loaded.cache.memory_size, 128 * 1024 * 1024);
        assert_eq!(loaded.cache.disk_size, 2 * 1024 * 1024 * 1024);
        assert_eq!(loaded.fetch.workers, 12);
        assert_eq!(loaded.fetch.probe_address.as_deref(), Some("1.1.1.1:443"));
        assert_eq!(loaded.keys.algorithm, KeyAlgorithm::Structural);
        assert_eq!(
            loaded.catalog.url.as_deref(),
            Some("https://example.com/images.json")
        );
    }

    #[test]
    fn test_defaults_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        ConfigFile::default().save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
        assert_eq!(loaded.fetch.workers, DEFAULT_FETCH_WORKERS);
        assert_eq!(loaded.fetch.user_agent, DEFAULT_USER_AGENT);
        assert!(loaded.fetch.probe_address.is_none());
        assert!(loaded.catalog.url.is_none());
    }

    #[test]
    fn test_output_is_commented() {
        let content = to_config_string(&ConfigFile::default());
        assert!(content.contains("[cache]"));
        assert!(content.contains("memory_size = 64MB"));
        assert!(content.contains("algorithm = sha256"));
        assert!(content.lines().any(|l| l.starts_with(';')));
    }

    #[test]
    fn test_path_to_string_collapses_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("thumbs")), "~/thumbs");
        }
    }
}
