//! HTTP origin backed by reqwest.

use super::Origin;
use crate::config::defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::error::LoadError;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpOriginConfig {
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOriginConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Fetches images over HTTP(S). The identifier is the URL.
#[derive(Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(config: HttpOriginConfig) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LoadError::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// The underlying client, shared with other HTTP consumers such as the catalog.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get(&self, url: &str) -> Result<Bytes, LoadError> {
        trace!(url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) => {
                warn!(
                    url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(classify(&e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "HTTP error status");
            return Err(LoadError::Origin {
                status: Some(status.as_u16()),
                message: format!("HTTP {} from {}", status, url),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes)
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to read response body");
                Err(classify(&e))
            }
        }
    }
}

impl Origin for HttpOrigin {
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Bytes, LoadError>> {
        self.get(identifier).boxed()
    }
}

/// Map a transport error onto the load error taxonomy.
fn classify(e: &reqwest::Error) -> LoadError {
    if e.is_timeout() {
        LoadError::Timeout
    } else if e.is_connect() {
        LoadError::NoConnectivity
    } else {
        LoadError::Origin {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
