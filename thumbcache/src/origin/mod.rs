//! Upstream image sources.
//!
//! The loader fetches encoded bytes through the [`Origin`] trait and checks
//! a [`ConnectivityProbe`] first so an offline host fails fast. Both are
//! traits so tests can inject mocks.

pub mod connectivity;
mod http;

pub use connectivity::{AlwaysOnline, ConnectivityProbe, TcpProbe};
pub use http::{HttpOrigin, HttpOriginConfig};

use crate::error::LoadError;
use bytes::Bytes;
use futures::future::BoxFuture;

/// Source of encoded image bytes.
pub trait Origin: Send + Sync + 'static {
    /// Fetch the encoded bytes for `identifier`.
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Bytes, LoadError>>;
}
