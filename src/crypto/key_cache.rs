//! Bounded in-process cache of user keys.
//!
//! Entries expire after a TTL and the least recently used key is evicted
//! once the capacity is reached. A poisoned lock behaves like a miss.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::KeyCacheSettings;
use crate::models::UserId;

use super::KeyMaterial;

struct CacheEntry {
    key: Arc<KeyMaterial>,
    inserted_at: Instant,
}

/// LRU + TTL cache of decoded keys, keyed by user id
pub struct KeyCache {
    cache: Mutex<LruCache<UserId, CacheEntry>>,
    ttl: Duration,
}

impl KeyCache {
    /// Create a cache holding at most `capacity` keys for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn from_settings(settings: &KeyCacheSettings) -> Self {
        Self::new(settings.capacity, Duration::from_secs(settings.ttl_secs))
    }

    /// Get the cached key for a user, `None` if absent or expired.
    pub fn get(&self, user_id: &UserId) -> Option<Arc<KeyMaterial>> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(user_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(Arc::clone(&entry.key));
            }
            cache.pop(user_id);
        }
        None
    }

    pub fn put(&self, user_id: &UserId, key: Arc<KeyMaterial>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                user_id.clone(),
                CacheEntry {
                    key,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop one user's key
    pub fn invalidate(&self, user_id: &UserId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(user_id);
        }
    }

    /// Drop every cached key
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Arc<KeyMaterial> {
        Arc::new(KeyMaterial::from_bytes([byte; 32]))
    }

    #[test]
    fn cache_put_and_get() {
        let cache = KeyCache::new(10, Duration::from_secs(300));
        let user = UserId::from("u1");
        assert!(cache.get(&user).is_none());

        cache.put(&user, key(1));
        assert_eq!(cache.get(&user).unwrap().as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn cache_invalidate() {
        let cache = KeyCache::new(10, Duration::from_secs(300));
        let user = UserId::from("u1");
        cache.put(&user, key(1));

        cache.invalidate(&user);
        assert!(cache.get(&user).is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = KeyCache::new(10, Duration::from_millis(1));
        let user = UserId::from("u1");
        cache.put(&user, key(1));

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get(&user).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let cache = KeyCache::new(2, Duration::from_secs(300));
        let (a, b, c) = (UserId::from("a"), UserId::from("b"), UserId::from("c"));
        cache.put(&a, key(1));
        cache.put(&b, key(2));
        // touch a so b becomes the eviction candidate
        assert!(cache.get(&a).is_some());
        cache.put(&c, key(3));

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let cache = KeyCache::new(0, Duration::from_secs(300));
        let user = UserId::from("u1");
        cache.put(&user, key(9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = KeyCache::new(10, Duration::from_secs(300));
        cache.put(&UserId::from("a"), key(1));
        cache.put(&UserId::from("b"), key(2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
