//! Cache entry with TTL support

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A single cached value with its expiry and access timestamps.
///
/// An entry is visible to readers only while `now < expires_at`; once
/// expired it is logically absent and removed on the next access.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Last access time (for LRU tracking)
    pub accessed_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Create a new entry expiring `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(3600));

        Self {
            value,
            expires_at,
            accessed_at: now,
        }
    }

    /// Check if the entry has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Mark the entry as accessed, refreshing its LRU position.
    pub fn mark_accessed(&mut self) {
        self.accessed_at = Utc::now();
    }

    /// Time left until expiration, if any.
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now > self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }
}
