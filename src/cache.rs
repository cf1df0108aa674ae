// In-process result cache for the product endpoints.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

type Slot<V> = Arc<AsyncMutex<Option<CacheEntry<V>>>>;

/// TTL cache whose rebuilds are single-flight per key: concurrent callers that
/// find a key stale wait for one build instead of starting their own.
pub struct PriceCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V: Clone + Send> PriceCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Returns the cached value or runs `build` while holding the key's lock.
    /// Errors are handed back and leave the key empty.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref().filter(|e| !e.is_expired()) {
            debug!(key, "cache hit");
            return Ok(entry.value.clone());
        }

        debug!(key, "cache miss");
        let value = build().await?;
        *guard = Some(CacheEntry::new(value.clone(), self.ttl));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn build_counted(cache: &PriceCache<u32>, key: &str, builds: &AtomicUsize) -> u32 {
        cache
            .get_or_try_insert_with(key, move || async move {
                Ok::<_, ()>(builds.fetch_add(1, Ordering::SeqCst) as u32)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn concurrent_misses_build_once() {
        let cache = Arc::new(PriceCache::<u32>::new(Duration::from_secs(3600)));
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let builds = builds.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with("nike", move || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(42));
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_build_is_not_cached() {
        let cache = PriceCache::<u32>::new(Duration::from_secs(3600));
        let err = cache
            .get_or_try_insert_with("adidas-jersey", || async { Err::<u32, _>("boom") })
            .await;
        assert_eq!(err, Err("boom"));

        let builds = AtomicUsize::new(7);
        assert_eq!(build_counted(&cache, "adidas-jersey", &builds).await, 7);
        assert_eq!(build_counted(&cache, "adidas-jersey", &builds).await, 7);
        assert_eq!(builds.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn expired_entries_rebuild() {
        let cache = PriceCache::<u32>::new(Duration::from_millis(20));
        let builds = AtomicUsize::new(0);
        assert_eq!(build_counted(&cache, "nike", &builds).await, 0);
        assert_eq!(build_counted(&cache, "nike", &builds).await, 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(build_counted(&cache, "nike", &builds).await, 1);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
