//! Cache management CLI commands.

use std::path::Path;

use clap::Subcommand;
use thumbcache::cache::{DiskCache, DiskCacheConfig};
use thumbcache::config::{format_size, ConfigFile};

use crate::error::CliError;
use crate::runner::load_config;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear the disk cache, removing all cached images
    Clear,
    /// Show disk cache statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(config_path: Option<&Path>, action: CacheAction) -> Result<(), CliError> {
    let (_, config) = load_config(config_path)?;
    let cache = open_disk_cache(&config)?;

    match action {
        CacheAction::Clear => {
            println!("Clearing disk cache at: {}", cache.directory().display());

            let result = cache
                .clear()
                .map_err(|e| CliError::Cache(e.to_string()))?;
            println!(
                "Deleted {} entries, freed {}",
                result.entries_removed,
                format_size(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Stats => {
            println!("Disk cache: {}", cache.directory().display());
            println!("  Entries: {}", cache.len());
            println!(
                "  Size:    {} / {}",
                format_size(cache.size_bytes()),
                format_size(cache.max_size_bytes())
            );
            Ok(())
        }
    }
}

fn open_disk_cache(config: &ConfigFile) -> Result<DiskCache, CliError> {
    let disk_config = DiskCacheConfig::new(config.cache.directory.clone(), config.cache.disk_size);
    DiskCache::open(disk_config).map_err(|e| CliError::Cache(e.to_string()))
}
