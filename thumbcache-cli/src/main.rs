//! thumbcache CLI - Command-line interface
//!
//! Exercises the thumbcache library from a shell: resolve images through
//! the memory and disk tiers, warm the cache from a JSON catalog, and
//! manage the on-disk cache and configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::cache::CacheAction;
use commands::catalog::CatalogArgs;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "thumbcache")]
#[command(version = thumbcache::VERSION)]
#[command(about = "Tiered image cache with coalesced background fetching", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.thumbcache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load images by identifier (usually a URL)
    Fetch {
        /// Identifiers to resolve; duplicates share one fetch
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Print tier statistics afterwards
        #[arg(long)]
        stats: bool,
    },

    /// List a JSON image catalog
    Catalog {
        /// Catalog URL (default: [catalog] url from the config file)
        #[arg(long)]
        url: Option<String>,

        /// Only use the first N records
        #[arg(long)]
        limit: Option<usize>,

        /// Load every listed thumbnail into the cache
        #[arg(long)]
        warm: bool,
    },

    /// Disk cache management
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        e.exit();
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Fetch { identifiers, stats } => {
            commands::fetch::run(config_path, FetchArgs { identifiers, stats }).await
        }
        Commands::Catalog { url, limit, warm } => {
            commands::catalog::run(config_path, CatalogArgs { url, limit, warm }).await
        }
        Commands::Cache { action } => commands::cache::run(config_path, action),
        Commands::Config { command } => commands::config::run(config_path, command),
    }
}
