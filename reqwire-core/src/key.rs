//! Cache key type and default derivation.
//!
//! A [`CacheKey`] is the join key used by the cache, the idempotency
//! registry and (optionally) the concurrency pool. The default derivation
//! joins the method, the url and the JSON-serialized body with `|`:
//!
//! ```
//! use reqwire_core::{CacheKey, Request};
//! use serde_json::json;
//!
//! let key = CacheKey::from_request(&Request::post("/users", json!({"id": 1})));
//! assert_eq!(key.as_str(), r#"post|/users|{"id":1}"#);
//!
//! // No body renders as an empty trailing segment.
//! let key = CacheKey::from_request(&Request::get("/users"));
//! assert_eq!(key.as_str(), "get|/users|");
//! ```
//!
//! [`SmolStr`] keeps short keys inline, so cloning a key is cheap.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::request::Request;

const SEPARATOR: char = '|';

/// Deterministic key derived from a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from any string.
    pub fn new(key: impl Into<SmolStr>) -> Self {
        CacheKey(key.into())
    }

    /// Default derivation: `method|url|json(data)`.
    pub fn from_request(request: &Request) -> Self {
        let data = request
            .data()
            .map(|data| data.to_string())
            .unwrap_or_default();
        Self::from_parts([request.method().as_str(), request.url(), data.as_str()])
    }

    /// Derivation without the body: `method|url`.
    pub fn from_route(request: &Request) -> Self {
        Self::from_parts([request.method().as_str(), request.url()])
    }

    fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut key = String::new();
        for (index, part) in parts.into_iter().enumerate() {
            if index > 0 {
                key.push(SEPARATOR);
            }
            key.push_str(part);
        }
        CacheKey(SmolStr::from(key))
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::new(key)
    }
}

impl From<CacheKey> for SmolStr {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}
