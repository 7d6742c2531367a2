//! Helpers shared by commands that load images.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thumbcache::{ImageLoader, LoadError, LoadedImage};
use tokio::task::JoinSet;

/// Result of loading one identifier.
pub struct LoadReport {
    pub identifier: String,
    pub outcome: Result<LoadedImage, LoadError>,
    pub elapsed: Duration,
}

impl LoadReport {
    /// One-line summary for terminal output.
    pub fn line(&self) -> String {
        match &self.outcome {
            Ok(image) => format!(
                "{}  {} via {} ({} ms)",
                self.identifier,
                image.blob.dimensions(),
                image.source,
                self.elapsed.as_millis()
            ),
            Err(e) if e.is_transient() => {
                format!("{}  FAILED (retryable): {}", self.identifier, e)
            }
            Err(e) => format!("{}  FAILED: {}", self.identifier, e),
        }
    }
}

/// Load every identifier concurrently, returning reports in input order.
///
/// Duplicates are allowed and coalesce inside the loader.
pub async fn load_all(loader: &Arc<ImageLoader>, identifiers: &[String]) -> Vec<LoadReport> {
    let mut tasks = JoinSet::new();
    for (index, identifier) in identifiers.iter().enumerate() {
        let loader = Arc::clone(loader);
        let identifier = identifier.clone();
        tasks.spawn(async move {
            let start = Instant::now();
            let outcome = loader.load(&identifier).await;
            (
                index,
                LoadReport {
                    identifier,
                    outcome,
                    elapsed: start.elapsed(),
                },
            )
        });
    }

    let mut slots: Vec<Option<LoadReport>> = identifiers.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => tracing::warn!(error = %e, "Load task failed"),
        }
    }

    slots
        .into_iter()
        .zip(identifiers)
        .map(|(slot, identifier)| {
            slot.unwrap_or_else(|| LoadReport {
                identifier: identifier.clone(),
                outcome: Err(LoadError::Internal("load task panicked".to_string())),
                elapsed: Duration::ZERO,
            })
        })
        .collect()
}

/// Number of failed reports.
pub fn count_failures(reports: &[LoadReport]) -> usize {
    reports.iter().filter(|r| r.outcome.is_err()).count()
}
