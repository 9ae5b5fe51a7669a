//! Error types for on-demand fetching.

use thiserror::Error;

/// Result type alias for flare-fetch operations.
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

/// Errors raised while configuring the fetcher or retrieving an asset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch configuration is invalid.
    #[error("invalid fetch configuration: {0}")]
    InvalidConfig(String),
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The upstream request failed at the transport level.
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The request key or cache path was rejected.
    #[error(transparent)]
    Cache(#[from] flare_core::Error),
    /// Writing the cache file failed.
    #[error("cache write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The upstream body ended before the cache file was committed.
    #[error("cache write aborted before completion")]
    Aborted,
}

impl FetchError {
    /// Returns whether this is a transport failure caused by an unresolvable host.
    #[must_use]
    pub fn is_host_not_found(&self) -> bool {
        match self {
            Self::Transport(err) => is_host_not_found(err),
            _ => false,
        }
    }
}

/// Walks the source chain of a transport error looking for a DNS failure.
pub(crate) fn is_host_not_found(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let message = cause.to_string();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}
