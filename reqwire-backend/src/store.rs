use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwire_core::{CacheKey, ExpirableValue};
use tracing::trace;

use crate::StoreResult;

/// Default time to live of a cached entry: 24 hours.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Status of a remove operation.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}

/// Raw access to stored entries.
///
/// `read` returns the entry as stored, whether or not it is still live;
/// expiry handling lives in [`CacheStoreExt`] so that every backend shares
/// one policy.
#[async_trait]
pub trait CacheStore<V>: Send + Sync {
    /// Reads the raw entry for `key`.
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<ExpirableValue<V>>>;

    /// Writes (or replaces) the entry for `key`.
    async fn write(&self, key: &CacheKey, value: ExpirableValue<V>) -> StoreResult<()>;

    /// Removes the entry for `key`.
    async fn remove(&self, key: &CacheKey) -> StoreResult<DeleteStatus>;

    /// Removes the entry for `key` only while it still expires at
    /// `expire_at`, so that an entry written after it was read survives.
    async fn evict(&self, key: &CacheKey, expire_at: DateTime<Utc>) -> StoreResult<DeleteStatus>;

    /// Removes every entry.
    async fn clear(&self) -> StoreResult<()>;

    /// Returns the name of this store for logs.
    fn name(&self) -> &str {
        "store"
    }
}

#[async_trait]
impl<V, T> CacheStore<V> for Arc<T>
where
    V: Send + 'static,
    T: CacheStore<V> + ?Sized,
{
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<ExpirableValue<V>>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &CacheKey, value: ExpirableValue<V>) -> StoreResult<()> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &CacheKey) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn evict(&self, key: &CacheKey, expire_at: DateTime<Utc>) -> StoreResult<DeleteStatus> {
        (**self).evict(key, expire_at).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Expiry-aware operations shared by every [`CacheStore`].
///
/// Expired entries are treated as absent and evicted on the touch that
/// notices them.
#[async_trait]
pub trait CacheStoreExt<V>: CacheStore<V>
where
    V: Send + 'static,
{
    /// Returns the live value for `key`, evicting it if it has expired.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<V>> {
        match self.read(key).await? {
            Some(entry) if entry.is_live() => Ok(Some(entry.into_inner())),
            Some(entry) => {
                trace!(store = self.name(), %key, "evicting expired entry");
                self.evict(key, entry.expire_at()).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Stores `value` so that it expires `duration` from now.
    async fn set(&self, key: &CacheKey, value: V, duration: Duration) -> StoreResult<()> {
        self.write(key, ExpirableValue::new(value, duration)).await
    }

    /// Returns `true` if a live entry exists for `key`.
    async fn has(&self, key: &CacheKey) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Moves the expiry of a live entry to `duration` from now.
    ///
    /// Returns `false` if the entry is missing or already expired.
    async fn touch(&self, key: &CacheKey, duration: Duration) -> StoreResult<bool> {
        match self.get(key).await? {
            Some(value) => {
                self.set(key, value, duration).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<V, T> CacheStoreExt<V> for T
where
    V: Send + 'static,
    T: CacheStore<V> + ?Sized,
{
}
