//! In-flight call deduplication.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwire_core::{CacheKey, Context, Middleware, Next, Request, RequestResult, Response};
use tracing::debug;

use super::KeyFn;
use crate::metrics;
use crate::promise::PromiseRegistry;

/// Options of the idempotency layer.
#[derive(Clone)]
pub struct IdempotentOptions {
    key: KeyFn,
}

impl Default for IdempotentOptions {
    fn default() -> Self {
        IdempotentOptions {
            key: Arc::new(CacheKey::from_request),
        }
    }
}

impl fmt::Debug for IdempotentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotentOptions").finish_non_exhaustive()
    }
}

impl IdempotentOptions {
    /// Replaces the key derivation.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Request) -> CacheKey + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }
}

/// Collapses concurrent calls with the same key into one.
///
/// The first call with a key runs the rest of the chain and registers the
/// resulting future before it settles. Calls arriving while it is in flight
/// join that exact future instead of running the chain again. Once it
/// settles, successfully or not, the key is free and the next call starts a
/// fresh request.
///
/// The in-flight call keeps running when every caller has gone away, so a
/// late joiner can still pick up its result.
pub struct IdempotentMiddleware<Res> {
    key: KeyFn,
    registry: PromiseRegistry<Res>,
}

impl<Res> fmt::Debug for IdempotentMiddleware<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotentMiddleware")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<Res: Response> IdempotentMiddleware<Res> {
    /// Creates the layer with its own registry.
    pub fn new(options: IdempotentOptions) -> Self {
        IdempotentMiddleware {
            key: options.key,
            registry: PromiseRegistry::new(),
        }
    }

    /// Registry of in-flight calls owned by this layer.
    pub fn registry(&self) -> &PromiseRegistry<Res> {
        &self.registry
    }
}

#[async_trait]
impl<Res: Response> Middleware<Res> for IdempotentMiddleware<Res> {
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        let key = (self.key)(&request);
        let (call, joined) = self
            .registry
            .get_or_insert_with(key.clone(), move || next.run(request, ctx));
        if joined {
            debug!(%key, "joined in-flight call");
            metrics::record_idempotent_reuse();
        } else {
            debug!(%key, "started call");
        }
        call.await
    }
}
