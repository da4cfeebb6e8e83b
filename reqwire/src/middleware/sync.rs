//! Synchronous read-through cache layer.
//!
//! The layer answers from an in-memory store without awaiting anything. On a
//! miss it starts the rest of the chain on the Tokio runtime and hands back a
//! [`Pending`] handle to it. The response is stored when the call resolves,
//! whether or not anyone awaits the handle, so reading the same key again
//! afterwards is [`Suspense::Ready`].
//!
//! Concurrent misses for one key are not merged here; install an
//! idempotency layer behind this one for that.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwire_backend::MemoryStore;
use reqwire_core::{CacheKey, Context, Next, Request, RequestResult, Response};
use tracing::debug;

use super::KeyFn;
use super::cache::{CacheContext, Ttl, ValidityContext};
use crate::metrics;
use crate::suspense::{Pending, Suspense};

type SyncValidatorFn<Res> = Arc<dyn Fn(&ValidityContext<'_, Res>) -> bool + Send + Sync>;
type WrapFn<Res> =
    Arc<dyn Fn(SuspenseContext<Res>) -> BoxFuture<'static, RequestResult<Res>> + Send + Sync>;

/// Call handed to the `wrap_suspense` hook on a miss.
pub struct SuspenseContext<Res> {
    /// Key of the call.
    pub key: CacheKey,
    /// Request as seen by the sync layer.
    pub request: Request,
    /// The rest of the chain, not started yet.
    pub pending: BoxFuture<'static, RequestResult<Res>>,
}

impl<Res> fmt::Debug for SuspenseContext<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspenseContext")
            .field("key", &self.key)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Options of the sync layer.
pub struct SyncOptions<Res> {
    key: KeyFn,
    ttl: Ttl<Res>,
    validator: Option<SyncValidatorFn<Res>>,
    suspense: bool,
    wrap_suspense: Option<WrapFn<Res>>,
}

impl<Res> Default for SyncOptions<Res> {
    fn default() -> Self {
        SyncOptions {
            key: Arc::new(CacheKey::from_route),
            ttl: Ttl::default(),
            validator: None,
            suspense: true,
            wrap_suspense: None,
        }
    }
}

impl<Res> fmt::Debug for SyncOptions<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("ttl", &self.ttl)
            .field("suspense", &self.suspense)
            .finish_non_exhaustive()
    }
}

impl<Res: Response> SyncOptions<Res> {
    /// Replaces the key derivation. The default ignores the request body.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Request) -> CacheKey + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    /// Sets the time to live of stored responses.
    pub fn duration(mut self, ttl: impl Into<Ttl<Res>>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Sets the check applied to live entries before serving them.
    pub fn is_valid<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ValidityContext<'_, Res>) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Chooses between [`Suspense::Suspended`] (`true`, the default) and
    /// [`Suspense::Deferred`] for misses.
    pub fn suspense(mut self, suspense: bool) -> Self {
        self.suspense = suspense;
        self
    }

    /// Post-processes the rest of the chain on a miss, before the layer adds
    /// its store step.
    pub fn wrap_suspense<F>(mut self, wrap: F) -> Self
    where
        F: Fn(SuspenseContext<Res>) -> BoxFuture<'static, RequestResult<Res>> + Send + Sync + 'static,
    {
        self.wrap_suspense = Some(Arc::new(wrap));
        self
    }
}

/// Read-through cache answering synchronously.
///
/// Install it with [`RequestorBuilder::sync`](crate::RequestorBuilder::sync);
/// it always runs outside every async layer.
pub struct SyncMiddleware<Res> {
    key: KeyFn,
    ttl: Ttl<Res>,
    validator: Option<SyncValidatorFn<Res>>,
    suspense: bool,
    wrap_suspense: Option<WrapFn<Res>>,
    store: MemoryStore<Res>,
}

impl<Res> fmt::Debug for SyncMiddleware<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMiddleware")
            .field("ttl", &self.ttl)
            .field("suspense", &self.suspense)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<Res: Response> SyncMiddleware<Res> {
    /// Creates the layer with its own store.
    pub fn new(options: SyncOptions<Res>) -> Self {
        SyncMiddleware {
            key: options.key,
            ttl: options.ttl,
            validator: options.validator,
            suspense: options.suspense,
            wrap_suspense: options.wrap_suspense,
            store: MemoryStore::new(),
        }
    }

    /// Store owned by this layer.
    pub fn store(&self) -> &MemoryStore<Res> {
        &self.store
    }

    /// Handles one call.
    ///
    /// A miss spawns the rest of the chain, so this must be called from
    /// within a Tokio runtime.
    pub fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> Suspense<Res> {
        let key = (self.key)(&request);

        let discarded = match self.store.get_item(&key) {
            Some(entry) if entry.is_live() => {
                let valid = self.validator.as_ref().is_none_or(|validator| {
                    validator(&ValidityContext {
                        key: &key,
                        request: &request,
                        cached_entry: &entry,
                    })
                });
                if valid {
                    debug!(%key, "sync cache hit");
                    metrics::record_cache_lookup("sync", true);
                    return Suspense::Ready(entry.into_inner());
                }
                debug!(%key, "cached entry rejected by validator");
                self.store.evict_item(&key, entry.expire_at());
                Some(entry)
            }
            Some(entry) => {
                debug!(%key, "cached entry expired");
                self.store.evict_item(&key, entry.expire_at());
                Some(entry)
            }
            None => None,
        };
        debug!(%key, suspense = self.suspense, "sync cache miss");
        metrics::record_cache_lookup("sync", false);

        let call = next.run(request.clone(), ctx);
        let call = match &self.wrap_suspense {
            Some(wrap) => wrap(SuspenseContext {
                key: key.clone(),
                request: request.clone(),
                pending: call,
            }),
            None => call,
        };

        let store = self.store.clone();
        let ttl = self.ttl.clone();
        let populate = async move {
            let response = call.await?;
            let duration = ttl.resolve(&CacheContext {
                key: &key,
                request: &request,
                cached_entry: discarded.as_ref(),
                response: &response,
            });
            store.set(&key, response.clone(), duration);
            debug!(%key, ?duration, "response cached");
            Ok(response)
        };

        let pending = Pending::spawn(populate.boxed());
        if self.suspense {
            Suspense::Suspended(pending)
        } else {
            Suspense::Deferred(pending)
        }
    }
}
