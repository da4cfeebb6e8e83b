//! Named base requestors.
//!
//! A [`Registry`] is an explicit, caller-owned map from a name to a base
//! requestor. Requestors built with
//! [`RequestorBuilder::from_registry`](crate::RequestorBuilder::from_registry)
//! resolve their transport from it by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwire_core::{BaseRequestor, SmolStr};
use tracing::debug;

use crate::error::RegistryError;

/// Name used when no other is given.
pub const DEFAULT_KEY: &str = "default";

/// Map from names to base requestors.
pub struct Registry<Res> {
    entries: HashMap<SmolStr, Arc<dyn BaseRequestor<Res>>>,
}

impl<Res> Default for Registry<Res> {
    fn default() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }
}

impl<Res> fmt::Debug for Registry<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<Res> Registry<Res> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `base` under `key`, replacing a previous registration.
    pub fn inject(&mut self, key: impl Into<SmolStr>, base: impl BaseRequestor<Res>) -> &mut Self {
        let key = key.into();
        debug!(%key, "base requestor injected");
        self.entries.insert(key, Arc::new(base));
        self
    }

    /// Registers `base` under [`DEFAULT_KEY`].
    pub fn inject_default(&mut self, base: impl BaseRequestor<Res>) -> &mut Self {
        self.inject(DEFAULT_KEY, base)
    }

    /// Returns the base requestor registered under `key`.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn BaseRequestor<Res>>, RegistryError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(SmolStr::new(key)))
    }

    /// Returns `true` if something is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
