//! Persistent stores.
//!
//! Persistent storage is consumed, not implemented, by reqwire: the caller
//! supplies a string key-value store (browser-like local storage, a file, a
//! remote cache...) through [`KeyValueStore`], and [`PersistentStore`]
//! turns it into a typed [`CacheStore`] by serializing every
//! [`ExpirableValue`] as JSON:
//!
//! ```text
//! {"value": <response>, "expireAt": <epoch millis>}
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwire_core::{CacheKey, ExpirableValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{StoreError, StoreResult};
use crate::store::{CacheStore, DeleteStatus};

/// String key-value store supplied by the caller.
///
/// Implementations may be synchronous underneath; the trait is async so that
/// remote stores fit as well.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the stored string for `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`.
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;

    /// Removes `key`. Returns `true` if it existed.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Removes every key.
    async fn clear(&self) -> StoreResult<()>;

    /// Lists every stored key.
    ///
    /// Needed to clear a namespaced [`PersistentStore`]. Stores that cannot
    /// enumerate their keys keep the default, which fails with
    /// [`StoreError::Unsupported`].
    async fn keys(&self) -> StoreResult<Vec<String>> {
        Err(StoreError::Unsupported("keys"))
    }
}

#[async_trait]
impl<T> KeyValueStore for Arc<T>
where
    T: KeyValueStore + ?Sized,
{
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys().await
    }
}

/// Process-local [`KeyValueStore`] backed by a concurrent map.
///
/// Useful as a session-scoped stand-in for a real persistent store, and in
/// tests. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    entries: Arc<DashMap<String, String>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the raw stored string for `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl KeyValueStore for SessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// Typed [`CacheStore`] over a caller-supplied [`KeyValueStore`].
///
/// Keys may be namespaced with [`PersistentStore::with_namespace`] so that
/// several caches can share one underlying store. `clear` then removes only
/// the keys of its own namespace, which requires [`KeyValueStore::keys`].
///
/// # Example
///
/// ```
/// use reqwire_backend::{CacheStoreExt, PersistentStore, SessionStore};
/// use reqwire_core::CacheKey;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let session = SessionStore::new();
/// let store = PersistentStore::new(session.clone()).with_namespace("users");
/// let key = CacheKey::new("get|/users|");
///
/// store.set(&key, vec!["alice".to_owned()], Duration::from_secs(60)).await.unwrap();
/// assert!(session.raw("users:get|/users|").is_some());
/// assert_eq!(store.get(&key).await.unwrap(), Some(vec!["alice".to_owned()]));
/// # }
/// ```
pub struct PersistentStore<S, V> {
    inner: S,
    namespace: Option<String>,
    _value: PhantomData<fn() -> V>,
}

impl<S, V> Clone for PersistentStore<S, V>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        PersistentStore {
            inner: self.inner.clone(),
            namespace: self.namespace.clone(),
            _value: PhantomData,
        }
    }
}

impl<S, V> std::fmt::Debug for PersistentStore<S, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("inner", &std::any::type_name::<S>())
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<S, V> PersistentStore<S, V> {
    /// Wraps a key-value store.
    pub fn new(inner: S) -> Self {
        PersistentStore {
            inner,
            namespace: None,
            _value: PhantomData,
        }
    }

    /// Prefixes every key with `namespace:`.
    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..self
        }
    }

    /// Returns the wrapped key-value store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}:{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl<S, V> CacheStore<V> for PersistentStore<S, V>
where
    S: KeyValueStore,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<ExpirableValue<V>>> {
        let storage_key = self.storage_key(key);
        match self.inner.get(&storage_key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &CacheKey, value: ExpirableValue<V>) -> StoreResult<()> {
        let raw = serde_json::to_string(&value)?;
        let storage_key = self.storage_key(key);
        debug!(key = %storage_key, bytes = raw.len(), "writing persistent entry");
        self.inner.set(&storage_key, raw).await
    }

    async fn remove(&self, key: &CacheKey) -> StoreResult<DeleteStatus> {
        Ok(match self.inner.remove(&self.storage_key(key)).await? {
            true => DeleteStatus::Deleted(1),
            false => DeleteStatus::Missing,
        })
    }

    async fn evict(&self, key: &CacheKey, expire_at: DateTime<Utc>) -> StoreResult<DeleteStatus> {
        // Key-value stores offer no compare-and-delete; re-read right before
        // removing to keep the window small.
        match self.read(key).await? {
            Some(entry) if entry.expire_at() == expire_at => self.remove(key).await,
            _ => Ok(DeleteStatus::Missing),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let Some(namespace) = &self.namespace else {
            return self.inner.clear().await;
        };
        let prefix = format!("{namespace}:");
        let mut removed = 0usize;
        for key in self.inner.keys().await? {
            if key.starts_with(&prefix) && self.inner.remove(&key).await? {
                removed += 1;
            }
        }
        debug!(%namespace, removed, "cleared persistent namespace");
        Ok(())
    }

    fn name(&self) -> &str {
        "persistent"
    }
}
