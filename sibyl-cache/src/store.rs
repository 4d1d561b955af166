//! Cache store with lazy TTL expiry and LRU eviction

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::stats::CacheStats;

/// Key/value cache with per-entry expiry and optional LRU capacity bound.
///
/// Expiry is lazy: an expired entry is treated as absent and physically
/// removed the next time it is looked up. When a `max_entries` bound is
/// configured, inserting into a full cache evicts exactly one entry, the
/// least recently accessed one (ties broken by insertion order).
///
/// All operations take the store lock, so a `set` is atomic with respect
/// to readers.
pub struct TtlCache<V> {
    config: CacheConfig,
    store: RwLock<Store<V>>,
}

struct Store<V> {
    entries: HashMap<String, CacheEntry<V>>,

    /// Access order, least recently used at the front
    lru_queue: VecDeque<String>,

    stats: CacheStats,
}

impl<V: Clone> TtlCache<V> {
    /// Unbounded cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_config(CacheConfig::new(default_ttl))
    }

    /// Bounded cache: at most `max_entries` live entries.
    pub fn bounded(default_ttl: Duration, max_entries: usize) -> Self {
        Self::with_config(CacheConfig::bounded(default_ttl, max_entries))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            store: RwLock::new(Store {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Look up a value. Expired entries count as absent and are removed.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut store = self.store.write().await;

        let lookup = match store.entries.get(key) {
            Some(entry) if entry.is_expired() => Lookup::Expired,
            Some(entry) => Lookup::Hit(entry.value.clone()),
            None => Lookup::Miss,
        };

        match lookup {
            Lookup::Expired => {
                debug!("cache entry expired: {}", key);
                store.stats.misses += 1;
                store.stats.expirations += 1;
                remove_entry(&mut store, key);
                None
            }
            Lookup::Hit(value) => {
                if let Some(entry) = store.entries.get_mut(key) {
                    entry.mark_accessed();
                }
                store.stats.hits += 1;

                // Move to the back of the access queue (most recently used)
                store.lru_queue.retain(|k| k != key);
                store.lru_queue.push_back(key.to_string());

                Some(value)
            }
            Lookup::Miss => {
                store.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a value with the instance default TTL.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl).await;
    }

    /// Insert a value with an explicit TTL, evicting the LRU entry first
    /// if the cache is at capacity.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry::new(value, ttl);
        let mut store = self.store.write().await;

        if store.entries.contains_key(&key) {
            store.entries.insert(key.clone(), entry);
            store.lru_queue.retain(|k| k != &key);
            store.lru_queue.push_back(key);
            return;
        }

        if let Some(max) = self.config.max_entries {
            while store.entries.len() >= max {
                match store.lru_queue.pop_front() {
                    Some(lru_key) => {
                        debug!("evicting least recently used entry: {}", lru_key);
                        store.entries.remove(&lru_key);
                        store.stats.evictions += 1;
                    }
                    None => break,
                }
            }
        }

        store.entries.insert(key.clone(), entry);
        store.lru_queue.push_back(key);
        store.stats.entries = store.entries.len();
    }

    /// Remove every entry. Hit/miss counters are retained.
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.entries.len();
        store.entries.clear();
        store.lru_queue.clear();
        store.stats.entries = 0;
        debug!("cleared {} cache entries", count);
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Whether a key is present, without refreshing its LRU position.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.store.read().await.entries.contains_key(key)
    }

    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        let mut stats = store.stats.clone();
        stats.entries = store.entries.len();
        stats
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Miss,
}

fn remove_entry<V>(store: &mut Store<V>, key: &str) {
    store.entries.remove(key);
    store.lru_queue.retain(|k| k != key);
    store.stats.entries = store.entries.len();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        cache.set("key1", "value1".to_string()).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_miss() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("nonexistent").await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_millis(80));
        cache.set("key1", "value1".to_string()).await;

        assert!(cache.get("key1").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("key1").await.is_none());
        // Removed on access, not just hidden
        assert!(!cache.contains_key("key1").await);
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_per_entry_ttl_override() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        cache
            .set_with_ttl("short", "v".to_string(), Duration::from_millis(50))
            .await;
        cache.set("long", "v".to_string()).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("short").await.is_none());
        assert!(cache.get("long").await.is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction_exactly_one() {
        let cache: TtlCache<String> = TtlCache::bounded(Duration::from_secs(60), 3);

        cache.set("key1", "v1".to_string()).await;
        cache.set("key2", "v2".to_string()).await;
        cache.set("key3", "v3".to_string()).await;

        // Fourth insert evicts exactly the least recently used (key1)
        cache.set("key4", "v4".to_string()).await;

        assert_eq!(cache.len().await, 3);
        assert!(cache.get("key1").await.is_none());
        assert!(cache.get("key2").await.is_some());
        assert!(cache.get("key3").await.is_some());
        assert!(cache.get("key4").await.is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_respects_access_order() {
        let cache: TtlCache<String> = TtlCache::bounded(Duration::from_secs(60), 3);

        cache.set("key1", "v1".to_string()).await;
        cache.set("key2", "v2".to_string()).await;
        cache.set("key3", "v3".to_string()).await;

        // Touch key1 so key2 becomes the LRU candidate
        cache.get("key1").await;

        cache.set("key4", "v4".to_string()).await;

        assert!(cache.get("key1").await.is_some());
        assert!(cache.get("key2").await.is_none());
        assert!(cache.get("key3").await.is_some());
        assert!(cache.get("key4").await.is_some());
    }

    #[tokio::test]
    async fn test_update_existing_key_does_not_evict() {
        let cache: TtlCache<String> = TtlCache::bounded(Duration::from_secs(60), 2);

        cache.set("key1", "v1".to_string()).await;
        cache.set("key2", "v2".to_string()).await;
        cache.set("key1", "v1b".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("key1").await, Some("v1b".to_string()));
        assert_eq!(cache.get("key2").await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        cache.set("key1", "v1".to_string()).await;
        cache.set("key2", "v2".to_string()).await;

        cache.clear().await;

        assert_eq!(cache.len().await, 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_string_values() {
        let cache: TtlCache<Vec<String>> = TtlCache::new(Duration::from_secs(60));
        cache
            .set("titles", vec!["a".to_string(), "b".to_string()])
            .await;

        let value = cache.get("titles").await.unwrap();
        assert_eq!(value.len(), 2);
    }
}
