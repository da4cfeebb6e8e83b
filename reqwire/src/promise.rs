//! Registry of in-flight calls.
//!
//! A [`PromiseRegistry`] maps a [`CacheKey`] to the shared future of the call
//! currently running under that key. Entries only exist while the future is
//! unsettled: the tracked future removes its own entry when it completes,
//! whether it succeeded or failed, so a later call with the same key starts
//! afresh. Registered calls run on the Tokio runtime, so they settle and
//! deregister even when every caller has gone away.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwire_core::{CacheKey, RequestResult, Response};
use tracing::trace;

use crate::dispatch::spawn_call;

/// Clonable handle to one in-flight call.
///
/// All clones resolve to the same result. Use [`Shared::ptr_eq`] to check
/// that two handles belong to the same call.
pub type SharedCall<Res> = Shared<BoxFuture<'static, RequestResult<Res>>>;

struct Slot<Res> {
    generation: u64,
    call: SharedCall<Res>,
}

/// Key to in-flight call map with self-removing entries.
///
/// Cloning the registry yields another handle to the same map.
pub struct PromiseRegistry<Res> {
    entries: Arc<DashMap<CacheKey, Slot<Res>>>,
    generation: Arc<AtomicU64>,
}

impl<Res> Clone for PromiseRegistry<Res> {
    fn clone(&self) -> Self {
        PromiseRegistry {
            entries: Arc::clone(&self.entries),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<Res> Default for PromiseRegistry<Res> {
    fn default() -> Self {
        PromiseRegistry {
            entries: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<Res> fmt::Debug for PromiseRegistry<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseRegistry")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<Res> PromiseRegistry<Res>
where
    Res: Response,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the in-flight call for `key`, if one is still unsettled.
    pub fn get(&self, key: &CacheKey) -> Option<SharedCall<Res>> {
        self.entries
            .get(key)
            .filter(|slot| slot.call.peek().is_none())
            .map(|slot| slot.call.clone())
    }

    /// Registers `call` under `key`, replacing any previous entry.
    ///
    /// The returned handle removes the entry once the call settles.
    pub fn insert(&self, key: CacheKey, call: BoxFuture<'static, RequestResult<Res>>) -> SharedCall<Res> {
        // Hold the entry while the call starts so it cannot deregister first.
        let entry = self.entries.entry(key.clone());
        let generation = self.next_generation();
        let shared = self.track(key, generation, call);
        entry.insert(Slot {
            generation,
            call: shared.clone(),
        });
        shared
    }

    /// Returns the in-flight call for `key`, or registers the one built by
    /// `start`.
    ///
    /// The boolean is `true` when an existing call was joined. Lookup and
    /// registration happen atomically, so concurrent callers with the same
    /// key always end up on one call.
    pub fn get_or_insert_with<F>(&self, key: CacheKey, start: F) -> (SharedCall<Res>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, RequestResult<Res>>,
    {
        let entry = self.entries.entry(key.clone());
        if let Entry::Occupied(occupied) = &entry
            && occupied.get().call.peek().is_none()
        {
            return (occupied.get().call.clone(), true);
        }
        let generation = self.next_generation();
        let shared = self.track(key, generation, start());
        entry.insert(Slot {
            generation,
            call: shared.clone(),
        });
        (shared, false)
    }

    /// Forgets the entry for `key` without affecting the call itself.
    pub fn remove(&self, key: &CacheKey) -> Option<SharedCall<Res>> {
        self.entries.remove(key).map(|(_, slot)| slot.call)
    }

    /// Forgets every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    fn track(
        &self,
        key: CacheKey,
        generation: u64,
        call: BoxFuture<'static, RequestResult<Res>>,
    ) -> SharedCall<Res> {
        let entries = Arc::clone(&self.entries);
        let tracked = async move {
            let result = call.await;
            // Only our own entry: a newer call may already own the key.
            if entries
                .remove_if(&key, |_, slot| slot.generation == generation)
                .is_some()
            {
                trace!(%key, ok = result.is_ok(), "in-flight call settled");
            }
            result
        };
        spawn_call(tracked.boxed()).shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwire_core::RequestError;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_entry_lives_only_while_unsettled() {
        let registry = PromiseRegistry::<u32>::new();
        let key = CacheKey::new("k");
        let (release, hold) = oneshot::channel::<u32>();

        let call = registry.insert(
            key.clone(),
            async move { hold.await.map_err(RequestError::transport) }.boxed(),
        );
        let joined = registry.get(&key).unwrap();
        assert!(Shared::ptr_eq(&call, &joined));
        assert_eq!(registry.len(), 1);

        release.send(7).unwrap();
        assert_eq!(call.await.unwrap(), 7);
        assert!(registry.is_empty());
        assert!(registry.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_failed_call_also_deregisters() {
        let registry = PromiseRegistry::<u32>::new();
        let key = CacheKey::new("k");
        let call = registry.insert(
            key.clone(),
            async { Err(RequestError::rejected("boom")) }.boxed(),
        );
        assert!(call.await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_settled_entry_is_not_joined() {
        let registry = PromiseRegistry::<u32>::new();
        let key = CacheKey::new("k");
        let (first, joined) = registry.get_or_insert_with(key.clone(), || async { Ok(1) }.boxed());
        assert!(!joined);
        assert_eq!(first.clone().await.unwrap(), 1);

        let (second, joined) = registry.get_or_insert_with(key.clone(), || async { Ok(2) }.boxed());
        assert!(!joined);
        assert!(!Shared::ptr_eq(&first, &second));
        assert_eq!(second.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_remove_newer_entry() {
        let registry = PromiseRegistry::<u32>::new();
        let key = CacheKey::new("k");
        let old = registry.insert(key.clone(), async { Ok(1) }.boxed());
        let (release, hold) = oneshot::channel::<u32>();
        let new = registry.insert(
            key.clone(),
            async move { hold.await.map_err(RequestError::transport) }.boxed(),
        );

        assert_eq!(old.await.unwrap(), 1);
        let current = registry.get(&key).unwrap();
        assert!(Shared::ptr_eq(&current, &new));

        release.send(2).unwrap();
        assert_eq!(new.await.unwrap(), 2);
        assert!(registry.is_empty());
    }
}
