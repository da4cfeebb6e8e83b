//! Per-call shared context.
//!
//! A [`Context`] is created fresh for every logical call and handed to every
//! middleware of that call. It is the sanctioned side channel between layers:
//! an outer middleware can leave a typed value for an inner one (or the other
//! way round on the way out) without widening the middleware signature.
//!
//! Cloning a `Context` clones the handle, not the map. All clones of one
//! call observe the same values.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Extensions;

/// Shared, mutable, per-call typed map.
///
/// # Example
///
/// ```
/// use reqwire_core::Context;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct UserId(u64);
///
/// let ctx = Context::new();
/// let inner = ctx.clone();
///
/// ctx.insert(UserId(7));
/// assert_eq!(inner.get::<UserId>(), Some(UserId(7)));
/// ```
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Mutex<Extensions>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.lock().len())
            .finish()
    }
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Extensions> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T>(&self, value: T) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.lock().insert(value)
    }

    /// Returns a clone of the stored value of type `T`.
    pub fn get<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.lock().get::<T>().cloned()
    }

    /// Returns `true` if a value of type `T` is stored.
    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.lock().get::<T>().is_some()
    }

    /// Removes and returns the stored value of type `T`.
    pub fn remove<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.lock().remove::<T>()
    }

    /// Updates the value of type `T` in place, inserting `T::default()` first
    /// if it is absent. Returns whatever `f` returns.
    pub fn update<T, R, F>(&self, f: F) -> R
    where
        T: Clone + Default + Send + Sync + 'static,
        F: FnOnce(&mut T) -> R,
    {
        let mut extensions = self.lock();
        let value = extensions.get_or_insert_default::<T>();
        f(value)
    }

    /// Returns `true` if `self` and `other` are handles to the same call.
    pub fn same_call(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
