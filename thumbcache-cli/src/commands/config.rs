//! Configuration management CLI commands.
//!
//! Provides `config init` and `config show` for creating and inspecting the
//! INI configuration file.

use std::path::Path;

use clap::Subcommand;
use thumbcache::config::{config_file_path, ConfigFile};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration and where it was loaded from
    Show,
}

/// Run a config subcommand.
pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(config_path, force),
        ConfigCommands::Show => run_show(config_path),
    }
}

/// Write the default configuration.
fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    if force {
        ConfigFile::default().save_to(&path)?;
    } else if !ConfigFile::ensure_exists(&path)? {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Print the effective configuration.
fn run_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let (path, config) = load_config(config_path)?;

    if path.exists() {
        println!("# Loaded from {}", path.display());
    } else {
        println!("# {} not found; showing defaults", path.display());
    }
    println!();
    print!("{}", config.to_ini_string());
    Ok(())
}
