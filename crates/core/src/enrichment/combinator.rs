//! Two-stage enrichment with independent failure handling.
//!
//! A primary and a secondary provider both try to fill in the same record.
//! Each stage's failure is reported through hooks and recorded in the
//! report; only a user stop from the secondary stage, or both stages
//! failing, turns into an error.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::provider::{Provider, ProviderError};

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The stage produced data and it was merged into the record.
    pub applied: bool,
}

/// Outcomes of every stage that ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub outcomes: Vec<EnrichmentOutcome>,
}

impl EnrichmentReport {
    pub fn applied_any(&self) -> bool {
        self.outcomes.iter().any(|o| o.applied)
    }

    pub fn outcome(&self, provider: Provider) -> Option<&EnrichmentOutcome> {
        self.outcomes.iter().find(|o| o.provider == provider)
    }

    pub fn errors(&self) -> impl Iterator<Item = &EnrichmentOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Errors that end the enrichment of a record.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The user asked to stop; the batch must end.
    #[error(transparent)]
    Stopped(ProviderError),

    #[error("enrichment failed; {primary}: {primary_error}; {secondary}: {secondary_error}")]
    AllProvidersFailed {
        primary: Provider,
        primary_error: ProviderError,
        secondary: Provider,
        secondary_error: ProviderError,
    },
}

impl EnrichError {
    pub fn is_stop(&self) -> bool {
        matches!(self, EnrichError::Stopped(_))
    }
}

type ApplyFn<'a, T, P> = Box<dyn FnOnce(&mut T, P) + Send + 'a>;
type ErrorHook<'a> = Box<dyn FnMut(&ProviderError) + Send + 'a>;

struct Stage<'a, T, P> {
    provider: Provider,
    fetch: BoxFuture<'a, Result<Option<P>, ProviderError>>,
    apply: ApplyFn<'a, T, P>,
}

/// Builder for a primary/secondary enrichment run over a `T`.
///
/// `P` and `S` are the payload types of the two stages. A fetch returning
/// `Ok(None)` means "nothing found" and is not a failure.
pub struct TwoStageEnrichment<'a, T, P, S> {
    primary: Option<Stage<'a, T, P>>,
    skip_primary: bool,
    on_primary_rate_limit: Option<ErrorHook<'a>>,
    on_primary_error: Option<ErrorHook<'a>>,
    secondary: Option<Stage<'a, T, S>>,
    secondary_enabled: bool,
    on_secondary_error: Option<ErrorHook<'a>>,
}

impl<'a, T, P, S> Default for TwoStageEnrichment<'a, T, P, S> {
    fn default() -> Self {
        Self {
            primary: None,
            skip_primary: false,
            on_primary_rate_limit: None,
            on_primary_error: None,
            secondary: None,
            secondary_enabled: true,
            on_secondary_error: None,
        }
    }
}

impl<'a, T, P, S> TwoStageEnrichment<'a, T, P, S>
where
    T: Send,
    P: Send + 'a,
    S: Send + 'a,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary<F, A>(mut self, provider: Provider, fetch: F, apply: A) -> Self
    where
        F: Future<Output = Result<Option<P>, ProviderError>> + Send + 'a,
        A: FnOnce(&mut T, P) + Send + 'a,
    {
        self.primary = Some(Stage {
            provider,
            fetch: fetch.boxed(),
            apply: Box::new(apply),
        });
        self
    }

    /// Skip the primary stage (e.g. the record already has its data).
    pub fn skip_primary_when(mut self, skip: bool) -> Self {
        self.skip_primary = skip;
        self
    }

    /// Called instead of the generic hook when the primary stage fails with
    /// a rate-limit error.
    pub fn on_primary_rate_limit(mut self, hook: impl FnMut(&ProviderError) + Send + 'a) -> Self {
        self.on_primary_rate_limit = Some(Box::new(hook));
        self
    }

    pub fn on_primary_error(mut self, hook: impl FnMut(&ProviderError) + Send + 'a) -> Self {
        self.on_primary_error = Some(Box::new(hook));
        self
    }

    pub fn secondary<F, A>(mut self, provider: Provider, enabled: bool, fetch: F, apply: A) -> Self
    where
        F: Future<Output = Result<Option<S>, ProviderError>> + Send + 'a,
        A: FnOnce(&mut T, S) + Send + 'a,
    {
        self.secondary = Some(Stage {
            provider,
            fetch: fetch.boxed(),
            apply: Box::new(apply),
        });
        self.secondary_enabled = enabled;
        self
    }

    pub fn on_secondary_error(mut self, hook: impl FnMut(&ProviderError) + Send + 'a) -> Self {
        self.on_secondary_error = Some(Box::new(hook));
        self
    }

    /// Run both stages against `target`.
    pub async fn run(mut self, target: &mut T) -> Result<EnrichmentReport, EnrichError> {
        let mut report = EnrichmentReport::default();
        let mut primary_failure = None;
        let mut secondary_failure = None;

        if let Some(stage) = self.primary.take() {
            if self.skip_primary {
                debug!(provider = %stage.provider, "Skipping primary enrichment");
            } else {
                match stage.fetch.await {
                    Ok(payload) => report.outcomes.push(apply_payload(stage.provider, stage.apply, target, payload)),
                    Err(err) if err.is_stop() => return Err(EnrichError::Stopped(err)),
                    Err(err) => {
                        let hook = if err.is_rate_limit() && self.on_primary_rate_limit.is_some() {
                            self.on_primary_rate_limit.as_mut()
                        } else {
                            self.on_primary_error.as_mut()
                        };
                        if let Some(hook) = hook {
                            hook(&err);
                        }
                        report.outcomes.push(failed(stage.provider, &err));
                        primary_failure = Some((stage.provider, err));
                    }
                }
            }
        }

        if let Some(stage) = self.secondary.take() {
            if !self.secondary_enabled {
                debug!(provider = %stage.provider, "Secondary enrichment disabled");
            } else {
                match stage.fetch.await {
                    Ok(payload) => report.outcomes.push(apply_payload(stage.provider, stage.apply, target, payload)),
                    Err(err) if err.is_stop() => return Err(EnrichError::Stopped(err)),
                    Err(err) => {
                        if let Some(hook) = self.on_secondary_error.as_mut() {
                            hook(&err);
                        }
                        report.outcomes.push(failed(stage.provider, &err));
                        secondary_failure = Some((stage.provider, err));
                    }
                }
            }
        }

        match (primary_failure, secondary_failure) {
            (Some((primary, primary_error)), Some((secondary, secondary_error))) => {
                Err(EnrichError::AllProvidersFailed {
                    primary,
                    primary_error,
                    secondary,
                    secondary_error,
                })
            }
            _ => Ok(report),
        }
    }
}

fn apply_payload<T, P>(
    provider: Provider,
    apply: ApplyFn<'_, T, P>,
    target: &mut T,
    payload: Option<P>,
) -> EnrichmentOutcome {
    let applied = match payload {
        Some(payload) => {
            apply(target, payload);
            true
        }
        None => {
            debug!(%provider, "Provider returned no data");
            false
        }
    };

    EnrichmentOutcome {
        provider,
        error: None,
        applied,
    }
}

fn failed(provider: Provider, err: &ProviderError) -> EnrichmentOutcome {
    EnrichmentOutcome {
        provider,
        error: Some(err.to_string()),
        applied: false,
    }
}
