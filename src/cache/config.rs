//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Runtime cache settings derived from `[cache]`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, lookups always miss and stores are dropped.
    pub enabled: bool,
    /// Maximum number of query signatures kept.
    pub capacity: NonZeroUsize,
    /// Entry lifetime; `None` keeps entries until evicted by capacity.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            ttl: settings.ttl,
        }
    }
}
