//! Configuration for thumbcache components.
//!
//! The user-facing configuration lives in `~/.thumbcache/config.ini` and is
//! loaded into a [`ConfigFile`]. [`ConfigFile::to_loader_config`] turns it
//! into the [`LoaderConfig`](crate::loader::LoaderConfig) consumed by the
//! image loader.
//!
//! # Example
//!
//! ```no_run
//! use thumbcache::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let loader_config = config.to_loader_config();
//! assert!(loader_config.fetch.workers > 0);
//! # Ok::<(), thumbcache::config::ConfigFileError>(())
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, CatalogSettings, ConfigFile, DecodeSettings, FetchSettings, KeySettings,
    LoggingSettings,
};
pub use size::{format_bytes, format_size, parse_size, SizeParseError};
