//! Configuration for a cache instance

use std::time::Duration;

/// Configuration for a [`crate::TtlCache`] instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when the caller does not override it per entry
    pub default_ttl: Duration,

    /// Maximum number of entries; `None` means unbounded.
    /// When the cache is full, a `set` of a new key evicts exactly one
    /// entry, the least recently accessed.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 1 hour, the standard TTL for relatively stable content
            default_ttl: Duration::from_secs(3600),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            max_entries: None,
        }
    }

    pub fn bounded(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            default_ttl,
            max_entries: Some(max_entries),
        }
    }
}
