//! Metrics declaration.
//!
//! All metrics are recorded through the [`metrics`](https://docs.rs/metrics)
//! facade and are compiled in only with the `metrics` feature.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of cache hit events.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "reqwire_cache_hit_total",
            "Total number of cache hit events."
        );
        "reqwire_cache_hit_total"
    };
    /// Track number of cache miss events.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "reqwire_cache_miss_total",
            "Total number of cache miss events."
        );
        "reqwire_cache_miss_total"
    };
    /// Track number of calls served by an already in-flight call.
    pub static ref IDEMPOTENT_REUSE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "reqwire_idempotent_reuse_total",
            "Total number of calls that joined an in-flight call."
        );
        "reqwire_idempotent_reuse_total"
    };
    /// Track number of retry attempts.
    pub static ref RETRY_ATTEMPT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "reqwire_retry_attempt_total",
            "Total number of retry attempts after a failed call."
        );
        "reqwire_retry_attempt_total"
    };
    /// Number of tasks waiting in concurrency pools.
    pub static ref POOL_QUEUED_GAUGE: &'static str = {
        metrics::describe_gauge!(
            "reqwire_pool_queued",
            "Number of tasks waiting for a concurrency pool slot."
        );
        "reqwire_pool_queued"
    };
    /// Number of tasks running in concurrency pools.
    pub static ref POOL_RUNNING_GAUGE: &'static str = {
        metrics::describe_gauge!(
            "reqwire_pool_running",
            "Number of tasks holding a concurrency pool slot."
        );
        "reqwire_pool_running"
    };
}

/// Records a cache lookup outcome for the named layer.
#[inline]
pub(crate) fn record_cache_lookup(_layer: &'static str, _hit: bool) {
    #[cfg(feature = "metrics")]
    {
        let name = if _hit {
            *CACHE_HIT_COUNTER
        } else {
            *CACHE_MISS_COUNTER
        };
        metrics::counter!(name, "layer" => _layer).increment(1);
    }
}

#[inline]
pub(crate) fn record_idempotent_reuse() {
    #[cfg(feature = "metrics")]
    metrics::counter!(*IDEMPOTENT_REUSE_COUNTER).increment(1);
}

#[inline]
pub(crate) fn record_retry_attempt() {
    #[cfg(feature = "metrics")]
    metrics::counter!(*RETRY_ATTEMPT_COUNTER).increment(1);
}

#[inline]
pub(crate) fn record_pool_state(_queued: usize, _running: usize) {
    #[cfg(feature = "metrics")]
    {
        metrics::gauge!(*POOL_QUEUED_GAUGE).set(_queued as f64);
        metrics::gauge!(*POOL_RUNNING_GAUGE).set(_running as f64);
    }
}
