//! Built-in layers.
//!
//! | layer                                | state it owns          |
//! |--------------------------------------|------------------------|
//! | [`cache`](fn@cache)                  | a [`CacheStore`]       |
//! | [`idempotent`](fn@idempotent)        | a [`PromiseRegistry`]  |
//! | [`retry`](fn@retry)                  | nothing                |
//! | [`concurrent`](fn@concurrent)        | a [`ConcurrencyPool`]  |
//! | [`sync`](fn@sync)                    | a [`MemoryStore`]      |
//!
//! Every constructor call creates fresh state. Two layers built from equal
//! options never share a store, registry or pool.
//!
//! [`CacheStore`]: reqwire_backend::CacheStore
//! [`MemoryStore`]: reqwire_backend::MemoryStore
//! [`PromiseRegistry`]: crate::promise::PromiseRegistry
//! [`ConcurrencyPool`]: crate::pool::ConcurrencyPool

use std::sync::Arc;

use reqwire_core::{CacheKey, Request, Response};

pub mod cache;
pub mod concurrent;
pub mod idempotent;
pub mod retry;
pub mod sync;

pub use self::cache::{
    AlwaysValid, CacheContext, CacheMiddleware, CacheOptions, Ttl, ValidityContext, Validator,
};
pub use self::concurrent::{ConcurrentMiddleware, ConcurrentOptions};
pub use self::idempotent::{IdempotentMiddleware, IdempotentOptions};
pub use self::retry::{Delay, RetryContext, RetryMiddleware, RetryOptions};
pub use self::sync::{SuspenseContext, SyncMiddleware, SyncOptions};

/// Key derivation shared by the keyed layers.
pub type KeyFn = Arc<dyn Fn(&Request) -> CacheKey + Send + Sync>;

/// Caches successful responses. See [`CacheMiddleware`].
pub fn cache<Res: Response>(options: CacheOptions<Res>) -> CacheMiddleware<Res> {
    CacheMiddleware::new(options)
}

/// Collapses concurrent identical calls. See [`IdempotentMiddleware`].
pub fn idempotent<Res: Response>(options: IdempotentOptions) -> IdempotentMiddleware<Res> {
    IdempotentMiddleware::new(options)
}

/// Retries failed calls. See [`RetryMiddleware`].
pub fn retry(options: RetryOptions) -> RetryMiddleware {
    RetryMiddleware::new(options)
}

/// Bounds how many calls run at once. See [`ConcurrentMiddleware`].
pub fn concurrent(options: ConcurrentOptions) -> ConcurrentMiddleware {
    ConcurrentMiddleware::new(options)
}

/// Answers reads synchronously from memory. See [`SyncMiddleware`].
pub fn sync<Res: Response>(options: SyncOptions<Res>) -> SyncMiddleware<Res> {
    SyncMiddleware::new(options)
}
