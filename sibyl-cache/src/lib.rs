//! Expiring key/value cache used across the Sibyl services.
//!
//! Provides:
//! - Per-entry TTL with lazy expiry (no background sweep)
//! - Optional capacity bound with least-recently-used eviction
//! - Hit/miss/eviction statistics

mod config;
mod entry;
mod stats;
mod store;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlCache;
