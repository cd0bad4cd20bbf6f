//! One-way rate-limit breaker.
//!
//! Once a provider reports its quota as exhausted, the breaker trips and every
//! later network request to that provider is refused for the rest of the run.
//! Cache reads are unaffected: the breaker is consulted by the HTTP client,
//! not by the persistent cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::provider::Provider;

/// Run-scoped flag that stops network calls to a provider after a quota error.
#[derive(Debug)]
pub struct RateLimitBreaker {
    provider: Provider,
    tripped: AtomicBool,
}

impl RateLimitBreaker {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            tripped: AtomicBool::new(false),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Trip the breaker.
    ///
    /// Returns `true` only for the call that performed the transition; the
    /// warning is logged exactly once no matter how many tasks race here.
    pub fn trip(&self) -> bool {
        let transitioned = self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if transitioned {
            warn!(
                provider = %self.provider,
                "{} rate limit reached; skipping further {} requests for this run",
                self.provider,
                self.provider
            );
        }

        transitioned
    }

    /// Whether network requests are still allowed.
    pub fn allowed(&self) -> bool {
        !self.tripped.load(Ordering::Acquire)
    }

    pub fn is_tripped(&self) -> bool {
        !self.allowed()
    }

    /// Close the breaker again. Runs never do this; tests reuse breakers.
    #[doc(hidden)]
    pub fn reset(&self) {
        self.tripped.store(false, Ordering::Release);
    }
}

/// The breakers for every provider, owned by the run context and shared by
/// the clients and the enrichment hooks.
#[derive(Debug, Clone)]
pub struct ProviderBreakers {
    pub tmdb: Arc<RateLimitBreaker>,
    pub omdb: Arc<RateLimitBreaker>,
    pub steam: Arc<RateLimitBreaker>,
}

impl ProviderBreakers {
    pub fn new() -> Self {
        Self {
            tmdb: Arc::new(RateLimitBreaker::new(Provider::Tmdb)),
            omdb: Arc::new(RateLimitBreaker::new(Provider::Omdb)),
            steam: Arc::new(RateLimitBreaker::new(Provider::Steam)),
        }
    }

    pub fn get(&self, provider: Provider) -> Arc<RateLimitBreaker> {
        match provider {
            Provider::Tmdb => Arc::clone(&self.tmdb),
            Provider::Omdb => Arc::clone(&self.omdb),
            Provider::Steam => Arc::clone(&self.steam),
        }
    }
}

impl Default for ProviderBreakers {
    fn default() -> Self {
        Self::new()
    }
}
