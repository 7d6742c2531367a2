//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use thumbcache::catalog::CatalogError;
use thumbcache::config::ConfigFileError;
use thumbcache::LoadError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to build the loader
    LoaderCreation(LoadError),
    /// Some identifiers could not be loaded
    Fetch { failed: usize, total: usize },
    /// Catalog download or parse failed
    Catalog(CatalogError),
    /// Cache maintenance failed
    Cache(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Fetch { .. } => {
                eprintln!();
                eprintln!("Per-image errors are listed above. Check the log for details:");
                eprintln!("  RUST_LOG=debug thumbcache fetch <identifiers>");
            }
            CliError::Catalog(CatalogError::Parse(_)) => {
                eprintln!();
                eprintln!("The catalog must be a JSON array of records with");
                eprintln!("'id', 'title' and 'thumbnail' {{domain, basePath, key}} fields.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'thumbcache config show' to see the active settings.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::LoaderCreation(e) => write!(f, "Failed to create image loader: {}", e),
            CliError::Fetch { failed, total } => {
                write!(f, "{} of {} images failed to load", failed, total)
            }
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Cache(msg) => write!(f, "Cache error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoaderCreation(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::LoaderCreation(e)
    }
}
