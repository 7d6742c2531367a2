//! Network availability checks.
//!
//! The loader asks the probe before going to the origin so an offline host
//! fails with [`LoadError::NoConnectivity`](crate::LoadError::NoConnectivity)
//! without waiting for a timeout.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Reports whether the network is usable.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn is_network_available(&self) -> BoxFuture<'_, bool>;
}

/// Probe that always reports the network as available.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_network_available(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(true).boxed()
    }
}

/// Probe that opens a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// `address` is a `host:port` pair.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_network_available(&self) -> BoxFuture<'_, bool> {
        async move {
            match tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str()))
                .await
            {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    debug!(address = %self.address, error = %e, "Connectivity probe failed");
                    false
                }
                Err(_) => {
                    debug!(address = %self.address, "Connectivity probe timed out");
                    false
                }
            }
        }
        .boxed()
    }
}
