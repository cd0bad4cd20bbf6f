//! Paced, breaker-aware HTTP client shared by the provider clients.
//!
//! Pacing is a [`governor`] token bucket of N requests per second with a
//! burst of N, one per client.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{Provider, ProviderError};
use crate::ratelimit::RateLimitBreaker;

type Pacer = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Retry schedule for transport failures.
///
/// Only transport failures are retried (timeouts, failed connects, dropped
/// connections). The delay before retry `n` is `base * 2^(n-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// HTTP client for one provider.
///
/// Every request first checks the provider breaker, then waits on the pacer.
/// A 429 answer trips the breaker.
pub struct HttpClient {
    provider: Provider,
    client: Client,
    pacer: Pacer,
    breaker: Arc<RateLimitBreaker>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(
        provider: Provider,
        timeout: Duration,
        requests_per_second: u32,
        breaker: Arc<RateLimitBreaker>,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marginalia/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            provider,
            client,
            pacer: RateLimiter::direct(Quota::per_second(rate)),
            breaker,
            retry,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn breaker(&self) -> &Arc<RateLimitBreaker> {
        &self.breaker
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self.send(url, query).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(format!("{} response: {}", self.provider, e)))
    }

    /// GET a binary body (images).
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.send(url, &[]).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ProviderError> {
        let mut attempt = 1;
        loop {
            if !self.breaker.allowed() {
                return Err(ProviderError::rate_limited(self.provider));
            }

            self.pacer.until_ready().await;

            match self.client.get(url).query(query).send().await {
                Ok(response) => return self.check_status(response).await,
                Err(e) => {
                    let err = ProviderError::from(e);
                    if !err.is_transient() || attempt >= self.retry.attempts {
                        return Err(err);
                    }

                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        provider = %self.provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.breaker.trip();
            return Err(ProviderError::rate_limited(self.provider));
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.trim().chars().take(512).collect();
        debug!(provider = %self.provider, status = status.as_u16(), "Provider returned error status");

        Err(ProviderError::Api {
            provider: self.provider,
            status: status.as_u16(),
            message,
        })
    }
}
