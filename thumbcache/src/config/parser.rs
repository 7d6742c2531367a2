//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MAX_FETCH_WORKERS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::key::KeyAlgorithm;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("memory_size") {
            let bytes = parse_size(v).map_err(|_| {
                invalid("cache", "memory_size", v, "expected format like '64MB' or '1GB'")
            })?;
            config.cache.memory_size = usize::try_from(bytes)
                .map_err(|_| invalid("cache", "memory_size", v, "too large for this platform"))?;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_size = parse_size(v).map_err(|_| {
                invalid("cache", "disk_size", v, "expected format like '50MB' or '1GB'")
            })?;
        }
    }

    // [fetch] section
    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("workers") {
            let workers: usize = parse_number("fetch", "workers", v)?;
            if workers == 0 || workers > MAX_FETCH_WORKERS {
                return Err(invalid(
                    "fetch",
                    "workers",
                    v,
                    &format!("must be between 1 and {}", MAX_FETCH_WORKERS),
                ));
            }
            config.fetch.workers = workers;
        }
        if let Some(v) = section.get("timeout_secs") {
            config.fetch.timeout_secs = parse_positive_secs("fetch", "timeout_secs", v)?;
        }
        if let Some(v) = section.get("connect_timeout_secs") {
            config.fetch.connect_timeout_secs =
                parse_positive_secs("fetch", "connect_timeout_secs", v)?;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.fetch.user_agent = v.to_string();
            }
        }
        if let Some(v) = section.get("probe_address") {
            let v = v.trim();
            if v.is_empty() {
                config.fetch.probe_address = None;
            } else if !v.contains(':') {
                return Err(invalid(
                    "fetch",
                    "probe_address",
                    v,
                    "expected host:port (e.g. 1.1.1.1:443)",
                ));
            } else {
                config.fetch.probe_address = Some(v.to_string());
            }
        }
    }

    // [decode] section
    if let Some(section) = ini.section(Some("decode")) {
        if let Some(v) = section.get("max_width") {
            config.decode.max_width = parse_number("decode", "max_width", v)?;
        }
        if let Some(v) = section.get("max_height") {
            config.decode.max_height = parse_number("decode", "max_height", v)?;
        }
    }

    // [keys] section
    if let Some(section) = ini.section(Some("keys")) {
        if let Some(v) = section.get("algorithm") {
            config.keys.algorithm = KeyAlgorithm::from_str(v)
                .map_err(|_| invalid("keys", "algorithm", v, "must be 'sha256' or 'structural'"))?;
        }
    }

    // [catalog] section
    if let Some(section) = ini.section(Some("catalog")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            config.catalog.url = (!v.is_empty()).then(|| v.to_string());
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive_secs(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(invalid(
            section,
            key,
            value,
            "must be a positive integer (seconds)",
        )),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_full_config() {
        let config = load(
            r#"
[cache]
directory = /var/cache/thumbs
memory_size = 32MB
disk_size = 1GB

[fetch]
workers = 8
timeout_secs = 10
connect_timeout_secs = 3
user_agent = gallery/2.0
probe_address = 1.1.1.1:443

[decode]
max_width = 256
max_height = 128

[keys]
algorithm = structural

[catalog]
url = https://example.com/catalog.json

[logging]
directory = /tmp/thumb-logs
"#,
        )
        .unwrap();

        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/thumbs"));
        assert_eq!(config.cache.memory_size, 32 * 1024 * 1024);
        assert_eq!(config.cache.disk_size, 1024 * 1024 * 1024);
        assert_eq!(config.fetch.workers, 8);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.connect_timeout_secs, 3);
        assert_eq!(config.fetch.user_agent, "gallery/2.0");
        assert_eq!(config.fetch.probe_address.as_deref(), Some("1.1.1.1:443"));
        assert_eq!(config.decode.max_width, 256);
        assert_eq!(config.decode.max_height, 128);
        assert_eq!(config.keys.algorithm, KeyAlgorithm::Structural);
        assert_eq!(
            config.catalog.url.as_deref(),
            Some("https://example.com/catalog.json")
        );
        assert_eq!(config.logging.directory, PathBuf::from("/tmp/thumb-logs"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load("[fetch]\nworkers = 2\n").unwrap();
        assert_eq!(config.fetch.workers, 2);
        assert_eq!(config.fetch.timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
        assert_eq!(config.cache.disk_size, DEFAULT_DISK_CACHE_SIZE);
    }

    #[test]
    fn test_invalid_cache_size() {
        let err = load("[cache]\nmemory_size = 2TB\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "cache");
                assert_eq!(key, "memory_size");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_workers() {
        assert!(load("[fetch]\nworkers = 0\n").is_err());
        assert!(load("[fetch]\nworkers = many\n").is_err());
        let err = load("[fetch]\nworkers = 100000\n").unwrap_err();
        assert!(err.to_string().contains("between 1 and"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = load("[fetch]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("positive integer"));
    }

    #[test]
    fn test_invalid_probe_address() {
        assert!(load("[fetch]\nprobe_address = example.com\n").is_err());
    }

    #[test]
    fn test_invalid_key_algorithm() {
        let err = load("[keys]\nalgorithm = md5\n").unwrap_err();
        assert!(err.to_string().contains("keys.algorithm"));
    }

    #[test]
    fn test_empty_catalog_url_is_none() {
        let config = load("[catalog]\nurl =\n").unwrap();
        assert!(config.catalog.url.is_none());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/thumbs"), home.join("thumbs"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
