//! TTL cache layer.
//!
//! Per call:
//!
//! 1. Compute the key and read the stored entry.
//! 2. A live entry is checked with the [`Validator`]. A valid entry is
//!    returned without running the rest of the chain; an invalid one is
//!    evicted.
//! 3. An expired entry is evicted and never reaches the validator.
//! 4. Otherwise the chain runs. A successful response is stored for the
//!    resolved [`Ttl`] and returned. Failures leave the store untouched.
//!
//! Store failures are logged and degrade to a miss; they never fail a call
//! that the transport answered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwire_backend::{
    CacheStore, DEFAULT_DURATION, KeyValueStore, MemoryStore, PersistentStore,
};
use reqwire_core::{
    CacheKey, Context, ExpirableValue, Middleware, Next, Request, RequestResult, Response,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::KeyFn;
use crate::metrics;

/// Inputs of a computed time to live.
#[derive(Debug)]
pub struct CacheContext<'a, Res> {
    /// Key of the call.
    pub key: &'a CacheKey,
    /// Request as seen by the cache layer.
    pub request: &'a Request,
    /// Entry found in the store and discarded because it was expired or
    /// invalid.
    pub cached_entry: Option<&'a ExpirableValue<Res>>,
    /// Fresh response about to be stored.
    pub response: &'a Res,
}

/// Inputs of a validity check.
#[derive(Debug)]
pub struct ValidityContext<'a, Res> {
    /// Key of the call.
    pub key: &'a CacheKey,
    /// Request as seen by the cache layer.
    pub request: &'a Request,
    /// Live entry found in the store.
    pub cached_entry: &'a ExpirableValue<Res>,
}

type TtlFn<Res> = Arc<dyn Fn(&CacheContext<'_, Res>) -> Duration + Send + Sync>;

/// How long a fresh response stays in the store.
pub enum Ttl<Res> {
    /// Same duration for every response.
    Fixed(Duration),
    /// Duration computed from the call and its response.
    Computed(TtlFn<Res>),
}

impl<Res> Ttl<Res> {
    /// Builds a computed time to live.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&CacheContext<'_, Res>) -> Duration + Send + Sync + 'static,
    {
        Ttl::Computed(Arc::new(f))
    }

    pub(crate) fn resolve(&self, ctx: &CacheContext<'_, Res>) -> Duration {
        match self {
            Ttl::Fixed(duration) => *duration,
            Ttl::Computed(f) => f(ctx),
        }
    }
}

impl<Res> Clone for Ttl<Res> {
    fn clone(&self) -> Self {
        match self {
            Ttl::Fixed(duration) => Ttl::Fixed(*duration),
            Ttl::Computed(f) => Ttl::Computed(Arc::clone(f)),
        }
    }
}

impl<Res> Default for Ttl<Res> {
    fn default() -> Self {
        Ttl::Fixed(DEFAULT_DURATION)
    }
}

impl<Res> From<Duration> for Ttl<Res> {
    fn from(duration: Duration) -> Self {
        Ttl::Fixed(duration)
    }
}

impl<Res> fmt::Debug for Ttl<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Ttl::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Decides whether a live cached entry may be served.
///
/// Plain closures `Fn(&ValidityContext<Res>) -> bool` implement this trait;
/// implement it by hand when the check has to await something.
#[async_trait]
pub trait Validator<Res>: Send + Sync + 'static {
    /// Returns `true` if the entry may be served.
    async fn is_valid(&self, ctx: &ValidityContext<'_, Res>) -> bool;
}

#[async_trait]
impl<Res, F> Validator<Res> for F
where
    Res: Response,
    F: Fn(&ValidityContext<'_, Res>) -> bool + Send + Sync + 'static,
{
    async fn is_valid(&self, ctx: &ValidityContext<'_, Res>) -> bool {
        self(ctx)
    }
}

/// Validator accepting every live entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

#[async_trait]
impl<Res: Response> Validator<Res> for AlwaysValid {
    async fn is_valid(&self, _ctx: &ValidityContext<'_, Res>) -> bool {
        true
    }
}

/// Options of the cache layer.
pub struct CacheOptions<Res> {
    key: KeyFn,
    ttl: Ttl<Res>,
    validator: Arc<dyn Validator<Res>>,
    store: Arc<dyn CacheStore<Res>>,
}

impl<Res: Response> Default for CacheOptions<Res> {
    fn default() -> Self {
        CacheOptions {
            key: Arc::new(CacheKey::from_request),
            ttl: Ttl::default(),
            validator: Arc::new(AlwaysValid),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl<Res> fmt::Debug for CacheOptions<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("ttl", &self.ttl)
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

impl<Res: Response> CacheOptions<Res> {
    /// Replaces the key derivation.
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
    pub fn is_valid(mut self, validator: impl Validator<Res>) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Uses `store` instead of a fresh in-memory store.
    pub fn store(mut self, store: impl CacheStore<Res> + 'static) -> Self {
        self.store = Arc::new(store);
        self
    }
}

impl<Res> CacheOptions<Res>
where
    Res: Response + Serialize + DeserializeOwned,
{
    /// Persists entries as JSON in a caller-supplied key-value store.
    pub fn persist(self, store: impl KeyValueStore) -> Self {
        self.store(PersistentStore::<_, Res>::new(store))
    }
}

/// Caches successful responses by key.
pub struct CacheMiddleware<Res> {
    key: KeyFn,
    ttl: Ttl<Res>,
    validator: Arc<dyn Validator<Res>>,
    store: Arc<dyn CacheStore<Res>>,
}

impl<Res> fmt::Debug for CacheMiddleware<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMiddleware")
            .field("ttl", &self.ttl)
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

impl<Res: Response> CacheMiddleware<Res> {
    /// Creates the layer with its own store.
    pub fn new(options: CacheOptions<Res>) -> Self {
        CacheMiddleware {
            key: options.key,
            ttl: options.ttl,
            validator: options.validator,
            store: options.store,
        }
    }

    /// Store owned by this layer.
    pub fn store(&self) -> Arc<dyn CacheStore<Res>> {
        Arc::clone(&self.store)
    }

    async fn lookup(&self, key: &CacheKey) -> Option<ExpirableValue<Res>> {
        match self.store.read(key).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(store = self.store.name(), %key, %error, "cache read failed");
                None
            }
        }
    }

    async fn evict(&self, key: &CacheKey, entry: &ExpirableValue<Res>) {
        if let Err(error) = self.store.evict(key, entry.expire_at()).await {
            warn!(store = self.store.name(), %key, %error, "cache eviction failed");
        }
    }
}

#[async_trait]
impl<Res: Response> Middleware<Res> for CacheMiddleware<Res> {
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        let key = (self.key)(&request);

        let discarded = match self.lookup(&key).await {
            Some(entry) if entry.is_live() => {
                let validity = ValidityContext {
                    key: &key,
                    request: &request,
                    cached_entry: &entry,
                };
                if self.validator.is_valid(&validity).await {
                    debug!(%key, "cache hit");
                    metrics::record_cache_lookup("cache", true);
                    return Ok(entry.into_inner());
                }
                debug!(%key, "cached entry rejected by validator");
                self.evict(&key, &entry).await;
                Some(entry)
            }
            Some(entry) => {
                debug!(%key, "cached entry expired");
                self.evict(&key, &entry).await;
                Some(entry)
            }
            None => None,
        };
        debug!(%key, "cache miss");
        metrics::record_cache_lookup("cache", false);

        let response = next.run(request.clone(), ctx).await?;

        let duration = self.ttl.resolve(&CacheContext {
            key: &key,
            request: &request,
            cached_entry: discarded.as_ref(),
            response: &response,
        });
        let entry = ExpirableValue::new(response.clone(), duration);
        match self.store.write(&key, entry).await {
            Ok(()) => debug!(%key, ?duration, "response cached"),
            Err(error) => warn!(store = self.store.name(), %key, %error, "cache write failed"),
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwire_backend::CacheStoreExt;
    use reqwire_core::{RequestError, base_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_chain(
        layer: CacheMiddleware<String>,
        calls: Arc<AtomicUsize>,
    ) -> Next<String> {
        let base = base_fn(move |request: Request| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("{}#{n}", request.url()))
            }
        });
        let layer: Arc<dyn Middleware<String>> = Arc::new(layer);
        Next::new(vec![layer].into(), Arc::new(base))
    }

    #[tokio::test]
    async fn test_invalid_entry_is_evicted_and_refetched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CacheMiddleware::new(
            CacheOptions::default()
                .is_valid(|ctx: &ValidityContext<'_, String>| !ctx.cached_entry.value().ends_with("#1")),
        );
        let store = layer.store();
        let next = counting_chain(layer, Arc::clone(&calls));

        let first = next.clone().run(Request::get("/a"), Context::new()).await.unwrap();
        assert_eq!(first, "/a#1");
        let second = next.clone().run(Request::get("/a"), Context::new()).await.unwrap();
        assert_eq!(second, "/a#2");
        let third = next.run(Request::get("/a"), Context::new()).await.unwrap();
        assert_eq!(third, "/a#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let key = CacheKey::new("get|/a|");
        assert_eq!(store.get(&key).await.unwrap(), Some("/a#2".to_owned()));
    }

    #[tokio::test]
    async fn test_expired_entry_skips_validator() {
        let calls = Arc::new(AtomicUsize::new(0));
        let checked = Arc::new(AtomicUsize::new(0));
        let layer = CacheMiddleware::new(
            CacheOptions::default()
                .duration(Duration::ZERO)
                .is_valid({
                    let checked = Arc::clone(&checked);
                    move |_: &ValidityContext<'_, String>| {
                        checked.fetch_add(1, Ordering::SeqCst);
                        true
                    }
                }),
        );
        let next = counting_chain(layer, Arc::clone(&calls));
        next.clone().run(Request::get("/a"), Context::new()).await.unwrap();
        next.run(Request::get("/a"), Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(checked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_computed_ttl_sees_response_and_discarded_entry() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let layer = CacheMiddleware::new(CacheOptions::default().duration(Ttl::computed({
            let seen = Arc::clone(&seen);
            move |ctx: &CacheContext<'_, String>| {
                seen.lock()
                    .unwrap()
                    .push((ctx.response.clone(), ctx.cached_entry.is_some()));
                Duration::ZERO
            }
        })));
        let next = counting_chain(layer, Arc::new(AtomicUsize::new(0)));
        next.clone().run(Request::get("/a"), Context::new()).await.unwrap();
        next.run(Request::get("/a"), Context::new()).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("/a#1".to_owned(), false), ("/a#2".to_owned(), true)]
        );
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = base_fn({
            let calls = Arc::clone(&calls);
            move |_request: Request| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(RequestError::rejected("down"))
                }
            }
        });
        let layer = CacheMiddleware::new(CacheOptions::default());
        let store = layer.store();
        let layer: Arc<dyn Middleware<String>> = Arc::new(layer);
        let next = Next::new(vec![layer].into(), Arc::new(base));

        assert!(next.clone().run(Request::get("/a"), Context::new()).await.is_err());
        assert!(next.run(Request::get("/a"), Context::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.has(&CacheKey::new("get|/a|")).await.unwrap());
    }

    #[tokio::test]
    async fn test_eviction_spares_an_entry_written_meanwhile() {
        let key = CacheKey::new("get|/a|");
        let store = MemoryStore::new();
        store.set(&key, "old".to_owned(), Duration::from_secs(60));

        // Another call refreshes the entry while this one judges the old one.
        let layer = CacheMiddleware::new(CacheOptions::default().store(store.clone()).is_valid({
            let store = store.clone();
            move |ctx: &ValidityContext<'_, String>| {
                store.set(ctx.key, "fresh".to_owned(), Duration::from_secs(120));
                false
            }
        }));
        let base = base_fn(|_request: Request| async {
            Err::<String, _>(RequestError::rejected("down"))
        });
        let layer: Arc<dyn Middleware<String>> = Arc::new(layer);
        let next = Next::new(vec![layer].into(), Arc::new(base));

        assert!(next.run(Request::get("/a"), Context::new()).await.is_err());
        assert_eq!(store.get(&key), Some("fresh".to_owned()));
    }
}
