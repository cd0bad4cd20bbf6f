//! External metadata providers (TMDB, OMDB, Steam storefront).
//!
//! Every provider owns an [`HttpClient`] that carries its request pacer, its
//! rate-limit breaker and the transport retry policy. The provider clients
//! layer the persistent cache over the raw endpoints through their
//! `cached_*` methods.

mod http;
mod omdb;
mod steam;
mod tmdb;
mod types;

pub use http::{HttpClient, RetryPolicy};
pub use omdb::{OmdbClient, OmdbConfig};
pub use steam::{SteamClient, SteamConfig};
pub use tmdb::{metadata_from_details, FindHit, TmdbClient, TmdbConfig};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to an external provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (timeout, connection reset, DNS...).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider's request quota is exhausted for this run.
    #[error("{provider} rate limit reached")]
    RateLimited { provider: Provider },

    /// The user asked to stop processing from an interactive prompt.
    #[error("{0}")]
    StopRequested(String),

    /// The provider answered with a non-success status.
    #[error("{provider} API error: {status} - {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client not configured (missing API key, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),

    /// The provider does not serve this media type.
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    /// The item exists but has no poster image.
    #[error("No poster available for {0}")]
    NoPoster(u64),
}

impl ProviderError {
    pub fn rate_limited(provider: Provider) -> Self {
        Self::RateLimited { provider }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self::StopRequested(reason.into())
    }

    /// Whether this error means the provider quota is exhausted.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether this error is a user-issued stop that must end the batch.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::StopRequested(_))
    }

    /// Whether this is a transport failure worth retrying: timeouts, failed
    /// connects and connections dropped mid-request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }
}
