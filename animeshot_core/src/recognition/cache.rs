//! In-memory recognition cache with LRU eviction
//!
//! Keyed by content signature so the same screenshot uploaded twice costs one
//! search call per run.

use super::types::Identification;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    identification: Identification,
    last_accessed: Instant,
}

/// Bounded cache of identifications
#[derive(Clone)]
pub struct RecognitionCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
    max_entries: usize,
}

impl Default for RecognitionCache {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl RecognitionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            max_entries,
        }
    }

    pub async fn get(&self, signature: &str) -> Option<Identification> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        match entries.get_mut(signature) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                stats.hit_count += 1;
                Some(entry.identification.clone())
            }
            None => {
                stats.miss_count += 1;
                None
            }
        }
    }

    pub async fn put(&self, signature: &str, identification: &Identification) {
        if self.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        if !entries.contains_key(signature) {
            while entries.len() >= self.max_entries {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_accessed)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                entries.remove(&oldest);
            }
        }

        entries.insert(
            signature.to_string(),
            CacheEntry {
                identification: identification.clone(),
                last_accessed: Instant::now(),
            },
        );
        stats.entry_count = entries.len();
    }

    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_and_miss_counting() {
        let cache = RecognitionCache::new(10);
        assert!(cache.get("a").await.is_none());

        cache.put("a", &Identification::unrecognized("low similarity")).await;
        assert!(cache.get("a").await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = RecognitionCache::new(2);
        cache.put("a", &Identification::unrecognized("a")).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        cache.put("b", &Identification::unrecognized("b")).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get("a").await.is_some());
        cache.put("c", &Identification::unrecognized("c")).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
        assert_eq!(cache.stats().await.entry_count, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let cache = RecognitionCache::new(0);
        cache.put("a", &Identification::unrecognized("a")).await;
        assert!(cache.get("a").await.is_none());
    }
}
