//! Ready-made layer stacks.
//!
//! Both helpers return a builder, so more layers can still be appended
//! before calling `build`.

use reqwire_core::{BaseRequestor, Response};

use crate::middleware::{
    CacheOptions, ConcurrentOptions, IdempotentOptions, RetryOptions, cache, concurrent,
    idempotent, retry,
};
use crate::requestor::RequestorBuilder;

/// Options of [`cached_idempotent`].
#[derive(Debug)]
pub struct CachedIdempotentOptions<Res> {
    /// Options of the outer idempotency layer.
    pub idempotent: IdempotentOptions,
    /// Options of the inner cache layer.
    pub cache: CacheOptions<Res>,
}

impl<Res: Response> Default for CachedIdempotentOptions<Res> {
    fn default() -> Self {
        CachedIdempotentOptions {
            idempotent: IdempotentOptions::default(),
            cache: CacheOptions::default(),
        }
    }
}

/// Options of [`concurrent_retry`].
#[derive(Debug, Clone, Default)]
pub struct ConcurrentRetryOptions {
    /// Options of the outer concurrency layer.
    pub concurrent: ConcurrentOptions,
    /// Options of the inner retry layer.
    pub retry: RetryOptions,
}

/// Idempotency over a cache: concurrent misses for one key reach the
/// transport once and the result is cached.
pub fn cached_idempotent<Res: Response>(
    base: impl BaseRequestor<Res>,
    options: CachedIdempotentOptions<Res>,
) -> RequestorBuilder<Res> {
    RequestorBuilder::new(base)
        .with(idempotent::<Res>(options.idempotent))
        .with(cache(options.cache))
}

/// Concurrency over retry: all attempts of a call share one pool slot.
pub fn concurrent_retry<Res: Response>(
    base: impl BaseRequestor<Res>,
    options: ConcurrentRetryOptions,
) -> RequestorBuilder<Res> {
    RequestorBuilder::new(base)
        .with(concurrent(options.concurrent))
        .with(retry(options.retry))
}
