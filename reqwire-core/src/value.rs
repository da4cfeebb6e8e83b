//! Values with an absolute expiry timestamp.
//!
//! [`ExpirableValue`] pairs a value with the instant it stops being usable.
//! Every TTL-based module stores its entries in this shape:
//!
//! - a value is **live** while `now < expire_at`
//! - a value that is not live must be treated as absent
//!
//! ```
//! use reqwire_core::ExpirableValue;
//! use std::time::Duration;
//!
//! let value = ExpirableValue::new("payload", Duration::from_secs(60));
//! assert!(value.is_live());
//! assert_eq!(value.into_live(), Some("payload"));
//!
//! let gone = ExpirableValue::new("payload", Duration::ZERO);
//! assert!(gone.is_expired());
//! ```
//!
//! When serialized (for persistent stores) the expiry is written as epoch
//! milliseconds under `expireAt`.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A value with an absolute expiry timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirableValue<T> {
    value: T,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expire_at: DateTime<Utc>,
}

impl<T> ExpirableValue<T> {
    /// Wraps `value` so that it expires `duration` from now.
    pub fn new(value: T, duration: Duration) -> Self {
        Self::with_expire_at(value, expire_after(Utc::now(), duration))
    }

    /// Wraps `value` with an explicit expiry instant.
    pub fn with_expire_at(value: T, expire_at: DateTime<Utc>) -> Self {
        ExpirableValue { value, expire_at }
    }

    /// Returns a reference to the value, regardless of expiry.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the expiry instant.
    #[inline]
    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    /// Returns `true` if the value is live at `now`.
    #[inline]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expire_at
    }

    /// Returns `true` if the value is live now.
    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now())
    }

    /// Returns `true` if the value has expired.
    pub fn is_expired(&self) -> bool {
        !self.is_live()
    }

    /// Remaining time to live, `None` once expired.
    pub fn ttl(&self) -> Option<Duration> {
        (self.expire_at - Utc::now()).to_std().ok().filter(|ttl| !ttl.is_zero())
    }

    /// Consumes the wrapper and returns the value, regardless of expiry.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Consumes the wrapper and returns the value only if it is still live.
    pub fn into_live(self) -> Option<T> {
        self.is_live().then_some(self.value)
    }

    /// Keeps the value and moves the expiry to `duration` from now.
    pub fn renew(self, duration: Duration) -> Self {
        Self::new(self.value, duration)
    }
}

fn expire_after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
