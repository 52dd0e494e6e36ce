//! TTL cache shared by the data adapters

use cached::{Cached, TimedCache};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

type InFlight<K> = Arc<Mutex<HashMap<K, Arc<Mutex<()>>>>>;

/// Thread-safe cache with a fixed entry lifespan
///
/// Cloning shares the underlying store. Concurrent misses on the same key
/// wait for a single fetch instead of each running their own.
pub struct DataCache<K, V> {
    cache: Arc<RwLock<TimedCache<K, V>>>,
    in_flight: InFlight<K>,
}

impl<K, V> DataCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: K, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetcher` and cache its success
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!("Cache hit for key: {:?}", key);
            return Ok(value);
        }

        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };

        let result: Result<V, E> = async {
            let _fetching = slot.lock().await;
            // Filled by whoever held the slot before us
            if let Some(value) = self.get(&key).await {
                tracing::debug!("Cache filled while waiting for key: {:?}", key);
                return Ok(value);
            }

            tracing::debug!("Cache miss for key: {:?}", key);
            let value = fetcher().await?;
            self.insert(key.clone(), value.clone()).await;
            Ok(value)
        }
        .await;

        let mut in_flight = self.in_flight.lock().await;
        let last_waiter = in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) <= 2);
        if last_waiter {
            in_flight.remove(&key);
        }

        result
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Clone for DataCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache: DataCache<String, Vec<f64>> = DataCache::new(Duration::from_secs(60));
        cache.insert("AAPL".to_string(), vec![1.0, 2.0]).await;

        assert_eq!(cache.get(&"AAPL".to_string()).await, Some(vec![1.0, 2.0]));
        assert!(cache.get(&"MSFT".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_fetches_once() {
        let cache: DataCache<(String, u32), f64> = DataCache::new(Duration::from_secs(60));
        let key = ("AAPL".to_string(), 365);

        let mut calls = 0;
        let value = cache
            .get_or_fetch(key.clone(), || {
                calls += 1;
                async { Ok::<_, String>(150.0) }
            })
            .await
            .unwrap();
        assert!((value - 150.0).abs() < f64::EPSILON);

        let value = cache
            .get_or_fetch(key, || {
                calls += 1;
                async { Ok::<_, String>(0.0) }
            })
            .await
            .unwrap();
        assert!((value - 150.0).abs() < f64::EPSILON);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let cache: DataCache<String, f64> = DataCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(42.0)
            }
        };

        let (first, second) = tokio::join!(
            cache.get_or_fetch("AAPL".to_string(), fetch),
            cache.get_or_fetch("AAPL".to_string(), fetch),
        );

        assert_eq!(first, Ok(42.0));
        assert_eq!(second, Ok(42.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache: DataCache<String, f64> = DataCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_fetch("X".to_string(), || async { Err::<f64, _>("down") })
            .await;

        assert_eq!(result, Err("down"));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache: DataCache<String, f64> = DataCache::new(Duration::from_secs(60));
        let other = cache.clone();
        other.insert("AAPL".to_string(), 1.0).await;

        assert_eq!(cache.len().await, 1);
        cache.clear().await;
        assert!(other.is_empty().await);
    }
}
