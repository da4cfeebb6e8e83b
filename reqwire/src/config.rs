//! Declarative pipeline configuration.
//!
//! A [`PipelineConfig`] describes which built-in layers a requestor gets and
//! how they are tuned. Any serde format works:
//!
//! ```yaml
//! idempotent: true
//! cache:
//!   ttl: 60s
//! retry:
//!   retries: 3
//!   delay: 100ms
//! concurrency:
//!   parallel: 4
//! ```
//!
//! Layers are installed in a fixed order, outermost first:
//! `idempotent → cache → concurrent → retry`. Duplicate calls merge before
//! the cache is consulted, and all retries of one call share a pool slot.

use std::time::Duration;

use bounded_integer::bounded_integer;
use reqwire_backend::DEFAULT_DURATION;
use reqwire_core::{BaseRequestor, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::middleware::{
    CacheOptions, ConcurrentOptions, IdempotentOptions, RetryOptions, cache, concurrent,
    idempotent, retry,
};
use crate::middleware::retry::DEFAULT_RETRIES;
use crate::requestor::RequestorBuilder;

bounded_integer! {
    /// Number of calls a pool runs at once (1-255).
    #[repr(u8)]
    pub struct ParallelCount { 1..=255 }
}

/// Cache layer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Time to live of cached responses (e.g. "5s", "500ms", "1m").
    /// Defaults to 24 hours.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// Retry layer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt. Defaults to 3.
    #[serde(default)]
    pub retries: Option<usize>,
    /// Pause before each retry. Defaults to none.
    #[serde(default, with = "humantime_serde")]
    pub delay: Option<Duration>,
}

/// Concurrency layer settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Calls allowed to run at once.
    pub parallel: ParallelCount,
}

/// Which built-in layers to install.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Merge concurrent identical calls.
    #[serde(default)]
    pub idempotent: bool,
    /// Cache successful responses.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    /// Retry failed calls.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Bound concurrent calls.
    #[serde(default)]
    pub concurrency: Option<ConcurrencyConfig>,
}

impl PipelineConfig {
    /// Parses a JSON document.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Checks values that the types alone cannot rule out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .cache
            .as_ref()
            .and_then(|cache| cache.ttl)
            .is_some_and(|ttl| ttl.is_zero())
        {
            return Err(ConfigError::ZeroDuration("cache.ttl"));
        }
        Ok(())
    }

    /// Appends the configured layers to `builder`.
    pub fn apply<Res: Response>(
        &self,
        mut builder: RequestorBuilder<Res>,
    ) -> Result<RequestorBuilder<Res>, ConfigError> {
        self.validate()?;
        if self.idempotent {
            builder = builder.with(idempotent::<Res>(IdempotentOptions::default()));
        }
        if let Some(config) = &self.cache {
            let ttl = config.ttl.unwrap_or(DEFAULT_DURATION);
            builder = builder.with(cache(CacheOptions::<Res>::default().duration(ttl)));
        }
        if let Some(config) = &self.concurrency {
            let parallel = usize::from(config.parallel.get());
            builder = builder.with(concurrent(
                ConcurrentOptions::default().parallel_count(parallel),
            ));
        }
        if let Some(config) = &self.retry {
            builder = builder.with(retry(
                RetryOptions::default()
                    .retries(config.retries.unwrap_or(DEFAULT_RETRIES))
                    .delay(config.delay.unwrap_or_default()),
            ));
        }
        debug!(config = ?self, "pipeline configured");
        Ok(builder)
    }

    /// Builds a requestor builder over `base` with the configured layers.
    pub fn into_builder<Res: Response>(
        self,
        base: impl BaseRequestor<Res>,
    ) -> Result<RequestorBuilder<Res>, ConfigError> {
        self.apply(RequestorBuilder::new(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_document() {
        let config = PipelineConfig::from_json(
            r#"{"idempotent": true, "cache": {"ttl": "1m"}, "concurrency": {"parallel": 2}}"#,
        )
        .unwrap();
        assert!(config.idempotent);
        assert_eq!(config.cache.unwrap().ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.concurrency.unwrap().parallel.get(), 2);
        assert!(config.retry.is_none());
    }

    #[test]
    fn test_zero_parallelism_is_rejected() {
        let error = PipelineConfig::from_json(r#"{"concurrency": {"parallel": 0}}"#).unwrap_err();
        assert!(matches!(error, ConfigError::Format(_)));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = PipelineConfig::from_json(r#"{"cache": {"ttl": "0s"}}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("cache.ttl"))
        ));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(PipelineConfig::from_json(r#"{"cache": {"stale": "1s"}}"#).is_err());
    }
}
