//! Search result storage keyed by query signature.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::{counter, gauge};
use tracing::{debug, warn};

use crate::domain::entities::Post;

use super::config::CacheConfig;

pub const METRIC_CACHE_HIT: &str = "tagfeed_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "tagfeed_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "tagfeed_cache_evict_total";
pub const METRIC_CACHE_ENTRIES: &str = "tagfeed_cache_entries";

#[derive(Clone)]
struct CacheEntry {
    posts: Vec<Post>,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.stored_at.elapsed() >= ttl)
    }
}

/// Merged search results, shared by all request handlers.
///
/// Built once at startup and handed to the search service. Entries are not
/// revalidated against the upstream; they leave only through LRU eviction
/// or TTL expiry.
pub struct PostCache {
    enabled: bool,
    ttl: Option<Duration>,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl PostCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(config.capacity)),
        }
    }

    /// Lock the entries, recovering them if a previous holder panicked.
    ///
    /// Every entry is a complete merged result, so a poisoned map is still
    /// consistent.
    fn lock_entries(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(
                op,
                result = "poisoned_recovered",
                "Recovered from poisoned search cache lock"
            );
            poisoned.into_inner()
        })
    }

    pub fn lookup(&self, signature: &str) -> Option<Vec<Post>> {
        if !self.enabled {
            return None;
        }

        let mut entries = self.lock_entries("lookup");
        let expired = match entries.get(signature) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                return Some(entry.posts.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(signature);
            gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
            debug!(signature, "dropped expired cache entry");
        }
        counter!(METRIC_CACHE_MISS).increment(1);
        None
    }

    /// Store `posts` under `signature`; a concurrent writer for the same
    /// signature simply overwrites.
    pub fn store(&self, signature: String, posts: Vec<Post>) {
        if !self.enabled {
            return;
        }

        let entry = CacheEntry {
            posts,
            stored_at: Instant::now(),
        };
        let mut entries = self.lock_entries("store");
        if let Some((evicted, _)) = entries.push(signature.clone(), entry) {
            if evicted != signature {
                counter!(METRIC_CACHE_EVICT).increment(1);
                debug!(evicted = %evicted, "evicted least recently used cache entry");
            }
        }
        gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.lock_entries("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
