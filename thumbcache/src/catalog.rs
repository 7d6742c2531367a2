//! JSON catalog of gallery images.
//!
//! The catalog is a JSON array of records:
//!
//! ```json
//! [{
//!   "id": "abc",
//!   "title": "Harbour at dusk",
//!   "thumbnail": {
//!     "domain": "https://cdn.example.com",
//!     "basePath": "images/2024",
//!     "key": "harbour.jpg",
//!     "qualities": [10, 20, 40]
//!   }
//! }]
//! ```
//!
//! Only the fields needed to build image URLs are read; anything else in a
//! record is ignored.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::defaults::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Quality level the gallery requests for thumbnails.
pub const THUMBNAIL_QUALITY: u32 = 0;

/// Errors fetching or parsing a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog request returned HTTP {0}")]
    Status(u16),

    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where an image is hosted and which sizes exist.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub domain: String,
    pub base_path: String,
    pub key: String,
    #[serde(default)]
    pub qualities: Vec<u32>,
}

impl Thumbnail {
    /// `domain/basePath/key`
    pub fn image_url(&self) -> String {
        format!("{}/{}/{}", self.domain, self.base_path, self.key)
    }

    /// `domain/basePath/quality/key`
    pub fn quality_url(&self, quality: u32) -> String {
        format!("{}/{}/{}/{}", self.domain, self.base_path, quality, self.key)
    }

    /// URL the gallery loads for a grid cell.
    pub fn thumbnail_url(&self) -> String {
        self.quality_url(THUMBNAIL_QUALITY)
    }
}

/// One catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageItem {
    pub id: String,
    pub title: String,
    pub thumbnail: Thumbnail,
}

/// Parse a catalog document.
pub fn parse_catalog(json: &str) -> Result<Vec<ImageItem>, CatalogError> {
    let items: Vec<ImageItem> = serde_json::from_str(json)?;
    debug!(items = items.len(), "Parsed catalog");
    Ok(items)
}

/// Downloads catalogs over HTTP.
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
}

impl CatalogClient {
    /// Client with default timeout and User-Agent.
    pub fn new() -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client, e.g. [`HttpOrigin::client`](crate::origin::HttpOrigin::client).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download and parse the catalog at `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<ImageItem>, CatalogError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let items = parse_catalog(&body)?;
        info!(url, items = items.len(), "Fetched catalog");
        Ok(items)
    }
}
