//! Fetch command - resolve identifiers through the cache tiers.

use std::path::Path;

use super::common::{count_failures, load_all};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub identifiers: Vec<String>,
    /// Print tier statistics after loading
    pub stats: bool,
}

/// Run the fetch command.
pub async fn run(config_path: Option<&Path>, args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("fetch");
    let loader = runner.create_loader()?;

    let reports = load_all(&loader, &args.identifiers).await;
    for report in &reports {
        println!("{}", report.line());
    }

    if args.stats {
        println!();
        println!("{}", loader.stats().format());
    }

    loader.shutdown().await;

    let failed = count_failures(&reports);
    if failed > 0 {
        return Err(CliError::Fetch {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}
