//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Entries are evicted this long after insertion.
    pub ttl: Option<Duration>,

    /// Entries are evicted if not read within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Telegram profiles: users and chats change rarely, but do change.
    pub fn profiles() -> Self {
        Self {
            max_capacity: 20_000,
            ttl: Some(Duration::from_secs(3600)),
            tti: None,
        }
    }

    /// Chat administrator lookups. Short lived, they are cheap to refetch
    /// and promotions should show up quickly.
    pub fn admin_lookups() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: Some(Duration::from_secs(120)),
        }
    }
}
