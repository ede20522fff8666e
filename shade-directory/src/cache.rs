//! TTL cache for resolved recipient keys.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use shade_core::types::RecipientKeys;

#[derive(Clone)]
struct CacheEntry {
    keys: RecipientKeys,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Default TTL in seconds
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_seconds: 600,
        }
    }
}

/// Registered keys by address, with TTL-based expiration.
///
/// Registrants can rotate keys, so entries expire rather than live forever.
pub struct KeyCache {
    entries: RwLock<HashMap<Address, CacheEntry>>,
    config: CacheConfig,
}

impl KeyCache {
    /// Creates a cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the cached keys unless missing or expired.
    pub fn get(&self, address: &Address) -> Option<RecipientKeys> {
        self.entries
            .read()
            .get(address)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.keys.clone())
    }

    /// Caches keys with the default TTL.
    pub fn insert(&self, address: Address, keys: RecipientKeys) {
        self.insert_with_ttl(address, keys, Duration::from_secs(self.config.default_ttl_seconds));
    }

    /// Caches keys with a custom TTL.
    pub fn insert_with_ttl(&self, address: Address, keys: RecipientKeys, ttl: Duration) {
        let mut entries = self.entries.write();

        if entries.len() >= self.config.max_entries {
            entries.retain(|_, entry| !entry.is_expired());
        }
        if entries.len() >= self.config.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(address, _)| *address)
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            address,
            CacheEntry {
                keys,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drops an entry.
    pub fn remove(&self, address: &Address) {
        self.entries.write().remove(address);
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::types::PublicKeyBytes;

    fn keys(fill: u8) -> RecipientKeys {
        let mut bytes = [fill; 65];
        bytes[0] = 0x04;
        let key = PublicKeyBytes::from_bytes(&bytes).unwrap();
        RecipientKeys::new(key.clone(), key)
    }

    #[test]
    fn test_insert_get_remove() {
        let cache = KeyCache::new();
        let address = Address::repeat_byte(1);
        cache.insert(address, keys(1));
        assert_eq!(cache.get(&address), Some(keys(1)));

        cache.remove(&address);
        assert!(cache.get(&address).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiration() {
        let cache = KeyCache::new();
        let address = Address::repeat_byte(1);
        cache.insert_with_ttl(address, keys(1), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(&address).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = KeyCache::with_config(CacheConfig {
            max_entries: 2,
            default_ttl_seconds: 3600,
        });
        cache.insert(Address::repeat_byte(1), keys(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(Address::repeat_byte(2), keys(2));
        cache.insert(Address::repeat_byte(3), keys(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&Address::repeat_byte(1)).is_none());
        assert!(cache.get(&Address::repeat_byte(3)).is_some());
    }
}
