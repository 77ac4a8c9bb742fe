//! In-process cache for merged post search results.
//!
//! Entries are keyed by the literal query signature and bounded by an LRU
//! capacity plus an optional TTL. Configuration lives under `[cache]`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 512
//! ttl_seconds = 0   # 0 keeps entries until evicted
//! ```

mod config;
mod store;

pub use config::CacheConfig;
pub use store::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, PostCache,
};
