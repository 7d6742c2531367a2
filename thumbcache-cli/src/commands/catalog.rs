//! Catalog command - list a JSON image catalog and optionally warm the cache.

use std::path::Path;

use thumbcache::catalog::{CatalogClient, ImageItem};

use super::common::{count_failures, load_all};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the catalog command.
pub struct CatalogArgs {
    /// Overrides `[catalog] url`
    pub url: Option<String>,
    pub limit: Option<usize>,
    /// Load every listed thumbnail into the cache
    pub warm: bool,
}

/// Run the catalog command.
pub async fn run(config_path: Option<&Path>, args: CatalogArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("catalog");

    let url = args
        .url
        .or_else(|| runner.config().catalog.url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No catalog URL. Set url in the [catalog] section or pass --url".to_string(),
            )
        })?;

    let loader = runner.create_loader()?;
    let client = CatalogClient::new()?;
    let mut items = client.fetch(&url).await?;
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    for item in &items {
        println!("{}", item_line(item));
    }
    println!();
    println!("{} images", items.len());

    let result = if args.warm && !items.is_empty() {
        let urls: Vec<String> = items.iter().map(|i| i.thumbnail.thumbnail_url()).collect();
        let reports = load_all(&loader, &urls).await;
        let failed = count_failures(&reports);
        for report in reports.iter().filter(|r| r.outcome.is_err()) {
            println!("{}", report.line());
        }
        println!("Warmed {} of {} thumbnails", reports.len() - failed, reports.len());
        println!();
        println!("{}", loader.stats().format());

        if failed > 0 {
            Err(CliError::Fetch {
                failed,
                total: reports.len(),
            })
        } else {
            Ok(())
        }
    } else {
        Ok(())
    };

    loader.shutdown().await;
    result
}

fn item_line(item: &ImageItem) -> String {
    format!(
        "{:<12} {:<32} {}",
        item.id,
        item.title,
        item.thumbnail.thumbnail_url()
    )
}
