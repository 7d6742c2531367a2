//! Error taxonomy for image resolution.
//!
//! Every failure a consumer can observe from [`ImageLoader::resolve`] is a
//! [`LoadError`]. Cache misses are never errors: they fall through to the
//! next tier.
//!
//! [`ImageLoader::resolve`]: crate::loader::ImageLoader::resolve

use thiserror::Error;

/// Reasons an image could not be delivered.
///
/// `LoadError` is `Clone` because one fetch outcome is broadcast to every
/// listener attached to the same in-flight task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The host has no usable network, or the origin host could not be reached.
    #[error("no network connectivity")]
    NoConnectivity,

    /// The origin did not answer within the configured timeout.
    #[error("origin request timed out")]
    Timeout,

    /// The origin answered with a non-success status or a broken response.
    #[error("origin error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Origin {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Human-readable description.
        message: String,
    },

    /// The bytes could not be decoded into an image.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Persistent storage failed in a way that prevented delivery.
    #[error("storage error: {0}")]
    Storage(String),

    /// The request was detached before an outcome was produced.
    #[error("request cancelled")]
    Cancelled,

    /// A worker failed unexpectedly (e.g. the fetch future panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoadError {
    /// Creates an origin error without an HTTP status.
    pub fn origin(message: impl Into<String>) -> Self {
        Self::Origin {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true if a later `resolve` could plausibly succeed.
    ///
    /// Decode failures are deterministic for the same bytes; everything
    /// network-shaped is transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoConnectivity | Self::Timeout | Self::Origin { .. } | Self::Storage(_)
        )
    }
}
