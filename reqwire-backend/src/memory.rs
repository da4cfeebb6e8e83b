//! In-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwire_core::{CacheKey, ExpirableValue};
use tracing::trace;

use crate::store::{CacheStore, DEFAULT_DURATION, DeleteStatus};
use crate::StoreResult;

/// Session-scoped, in-process cache store.
///
/// `MemoryStore` keeps entries in a concurrent map. It is a cheap-clone
/// handle: clones share the same entries, while two stores created with
/// [`MemoryStore::new`] are fully independent.
///
/// Besides the async [`CacheStore`] implementation it exposes the same
/// operations synchronously, which is what lets the suspense layer answer a
/// cache hit without awaiting anything.
///
/// # Example
///
/// ```
/// use reqwire_backend::MemoryStore;
/// use reqwire_core::CacheKey;
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// let key = CacheKey::new("get|/users|");
///
/// store.set(&key, vec![1, 2, 3], Duration::from_secs(60));
/// assert_eq!(store.get(&key), Some(vec![1, 2, 3]));
///
/// store.set(&key, vec![4], Duration::ZERO);
/// assert_eq!(store.get(&key), None);
/// assert!(store.is_empty(), "expired entries are evicted on touch");
/// ```
///
/// # Caveats
///
/// - Data is **not persisted**; it is lost when the process exits
/// - Data is **not shared** across processes
/// - Expired entries are evicted lazily, on the next touch of their key or
///   by [`MemoryStore::clear_expired`]
pub struct MemoryStore<V> {
    entries: Arc<DashMap<CacheKey, ExpirableValue<V>>>,
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        MemoryStore {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<V> MemoryStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Writes a raw entry.
    pub fn set_item(&self, key: &CacheKey, value: ExpirableValue<V>) {
        self.entries.insert(key.clone(), value);
    }

    /// Stores `value` so that it expires `duration` from now.
    pub fn set(&self, key: &CacheKey, value: V, duration: Duration) {
        self.set_item(key, ExpirableValue::new(value, duration));
    }

    /// Stores `value` with the default duration of 24 hours.
    pub fn set_default(&self, key: &CacheKey, value: V) {
        self.set(key, value, DEFAULT_DURATION);
    }

    /// Removes the entry for `key`. Returns `true` if it existed.
    pub fn remove_item(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes the entry for `key` if it still expires at `expire_at`.
    ///
    /// Returns `false` when the key is missing or holds a newer entry.
    pub fn evict_item(&self, key: &CacheKey, expire_at: DateTime<Utc>) -> bool {
        self.entries
            .remove_if(key, |_, value| value.expire_at() == expire_at)
            .is_some()
    }

    /// Returns `true` if a live entry exists, evicting an expired one.
    pub fn has(&self, key: &CacheKey) -> bool {
        let live = match self.entries.get(key) {
            Some(entry) => entry.is_live(),
            None => return false,
        };
        if !live {
            self.evict(key);
        }
        live
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not evicted yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of all stored entries.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Evicts every expired entry and returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, value| value.is_live_at(now));
        before.saturating_sub(self.entries.len())
    }

    fn evict(&self, key: &CacheKey) {
        let now = Utc::now();
        if self
            .entries
            .remove_if(key, |_, value| !value.is_live_at(now))
            .is_some()
        {
            trace!(%key, "evicted expired entry");
        }
    }
}

impl<V> MemoryStore<V>
where
    V: Clone,
{
    /// Returns the raw entry for `key`, live or not.
    pub fn get_item(&self, key: &CacheKey) -> Option<ExpirableValue<V>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the live value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let entry = self.get_item(key)?;
        if entry.is_live() {
            Some(entry.into_inner())
        } else {
            self.evict(key);
            None
        }
    }

    /// Moves the expiry of a live entry to `duration` from now.
    ///
    /// Returns `false` if the entry is missing or already expired.
    pub fn touch(&self, key: &CacheKey, duration: Duration) -> bool {
        match self.get(key) {
            Some(value) => {
                self.set(key, value, duration);
                true
            }
            None => false,
        }
    }

    /// Visits every live entry, evicting expired ones along the way.
    ///
    /// The index passed to `f` counts live entries only.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&CacheKey, &V, usize),
    {
        let now = Utc::now();
        let mut expired = Vec::new();
        let mut index = 0;
        for entry in self.entries.iter() {
            if entry.value().is_live_at(now) {
                f(entry.key(), entry.value().value(), index);
                index += 1;
            } else {
                expired.push(entry.key().clone());
            }
        }
        for key in expired {
            self.evict(&key);
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<ExpirableValue<V>>> {
        Ok(self.get_item(key))
    }

    async fn write(&self, key: &CacheKey, value: ExpirableValue<V>) -> StoreResult<()> {
        self.set_item(key, value);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> StoreResult<DeleteStatus> {
        Ok(match self.remove_item(key) {
            true => DeleteStatus::Deleted(1),
            false => DeleteStatus::Missing,
        })
    }

    async fn evict(&self, key: &CacheKey, expire_at: DateTime<Utc>) -> StoreResult<DeleteStatus> {
        Ok(match self.evict_item(key, expire_at) {
            true => DeleteStatus::Deleted(1),
            false => DeleteStatus::Missing,
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        MemoryStore::clear(self);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
