//! Cache storage for reqwire.
//!
//! Every TTL-based module stores [`ExpirableValue`]s behind the
//! [`CacheStore`] trait. Two families of backends satisfy it:
//!
//! - [`MemoryStore`] keeps entries in process memory. It also offers a
//!   synchronous API, which the suspense layer relies on.
//! - [`PersistentStore`] adapts any caller-supplied [`KeyValueStore`]
//!   (a string key-value store with `get`/`set`/`remove`/`clear`) and
//!   serializes entries as JSON.
//!
//! If you want to plug in your own storage, implement [`KeyValueStore`] for
//! string-level stores or [`CacheStore`] for typed ones.
//!
//! [`ExpirableValue`]: reqwire_core::ExpirableValue

mod error;
mod memory;
mod persistent;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use persistent::{KeyValueStore, PersistentStore, SessionStore};
pub use store::{CacheStore, CacheStoreExt, DEFAULT_DURATION, DeleteStatus};
