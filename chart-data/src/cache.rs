//! Short-lived response cache for provider queries.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Map of query signature to cached value, invalidated purely by age.
///
/// Validity is a pure function of the entry's age against the fixed
/// time-to-live; there is no background eviction. A stale entry is simply
/// overwritten by the next successful fetch.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Return the cached value if one exists and is younger than the TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|(value, inserted_at)| {
            (inserted_at.elapsed() < self.ttl).then(|| value.clone())
        })
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (value, Instant::now()));
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("spot".to_string(), 65_000.0_f64);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get(&"spot".to_string()), Some(65_000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_by_age() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("spot".to_string(), 65_000.0_f64);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&"spot".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_refreshes_age() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("spot".to_string(), 1.0_f64);

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.insert("spot".to_string(), 2.0);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.get(&"spot".to_string()), Some(2.0));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache: TtlCache<String, f64> = TtlCache::new(Duration::from_secs(30));
        assert_eq!(cache.get(&"history-1m".to_string()), None);
    }
}
