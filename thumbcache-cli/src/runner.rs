//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and loader creation
//! to reduce duplication across command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thumbcache::config::{config_file_path, ConfigFile};
use thumbcache::logging::{init_logging, LoggingGuard, DEFAULT_LOG_FILE};
use thumbcache::{Collaborators, ImageLoader};
use tracing::info;

use crate::error::CliError;

/// Load the config file at `path`, or the default location.
///
/// A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<(PathBuf, ConfigFile), CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&path)?;
    Ok((path, config))
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let (_, config) = load_config(config_path)?;

        let logging_guard = init_logging(&config.logging.directory, DEFAULT_LOG_FILE)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("thumbcache v{}", thumbcache::VERSION);
        info!("thumbcache CLI: {} command", command);
    }

    /// Build a loader from the loaded configuration.
    ///
    /// Must be called from within the Tokio runtime.
    pub fn create_loader(&self) -> Result<Arc<ImageLoader>, CliError> {
        let loader_config = self.config.to_loader_config();
        info!(
            cache_dir = %loader_config.disk.directory.display(),
            workers = loader_config.fetch.workers,
            "Creating image loader"
        );
        let loader = ImageLoader::new(loader_config, Collaborators::default())
            .map_err(CliError::LoaderCreation)?;
        Ok(Arc::new(loader))
    }
}
