//! Run-scoped rate-limit breakers, one per provider.
//!
//! Outbound pacing lives in [`crate::provider::HttpClient`].

mod breaker;

pub use breaker::{ProviderBreakers, RateLimitBreaker};
