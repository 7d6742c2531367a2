//! thumbcache - Tiered image cache with coalesced background fetching
//!
//! Resolves image identifiers (typically URLs) through three tiers:
//!
//! 1. a bounded, size-weighted LRU of decoded images in memory,
//! 2. a bounded on-disk cache of encoded bytes with atomic writes,
//! 3. the network, through a fixed-size worker pool that runs at most one
//!    fetch per key and shares its outcome with every waiting caller.
//!
//! # High-Level API
//!
//! [`ImageLoader`] is the entry point:
//!
//! ```no_run
//! use thumbcache::{Collaborators, ImageLoader, LoaderConfig};
//!
//! # async fn demo() -> Result<(), thumbcache::LoadError> {
//! let loader = ImageLoader::new(LoaderConfig::default(), Collaborators::default())?;
//!
//! // Callback style, cancellable
//! let subscription = loader.resolve("https://example.com/a.jpg", |outcome| {
//!     if let Ok(image) = outcome {
//!         println!("{} via {}", image.blob.dimensions(), image.source);
//!     }
//! });
//! subscription.cancel();
//!
//! // Async style
//! let image = loader.load("https://example.com/b.jpg").await?;
//! # let _ = image;
//! loader.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod blob;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod key;
pub mod loader;
pub mod logging;
pub mod origin;

#[cfg(test)]
mod testing;

pub use binding::ImageSlot;
pub use blob::{Dimensions, ImageBlob, ImageSource, LoadedImage};
pub use error::LoadError;
pub use fetch::Subscription;
pub use key::{derive_key, derive_key_with, CacheKey, KeyAlgorithm};
pub use loader::{Collaborators, ImageLoader, LoaderConfig, LoaderStats};

/// Version of the thumbcache library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
