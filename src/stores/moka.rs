use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::CacheEntry;
use crate::error::ResourceError;
use crate::store::{KeyPredicate, Store};

/// Configuration for MokaStore.
#[derive(Debug, Clone, Default)]
pub struct MokaStoreConfig {
    /// Maximum number of entries the cache can hold.
    /// `None` means unbounded: entries only leave on invalidation.
    pub max_capacity: Option<u64>,

    /// Time to idle: entries are evicted if not accessed within this duration.
    /// `None` means entries don't expire based on idle time.
    pub time_to_idle: Option<Duration>,
}

/// High-performance concurrent cache store using Moka.
///
/// MokaStore provides:
/// - Lock-free concurrent access for reads and writes
/// - Optional size and idle bounds for long-running processes
///
/// With the default configuration it behaves like `HashMapStore`. Setting a
/// capacity or idle bound lets Moka evict entries the engine would otherwise
/// keep serving stale.
pub struct MokaStore {
    cache: Cache<String, CacheEntry>,
}

impl MokaStore {
    /// Create a new MokaStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let config = MokaStoreConfig {
    ///     max_capacity: Some(10_000),
    ///     time_to_idle: Some(Duration::from_secs(600)),
    /// };
    /// let store = MokaStore::new(config);
    /// ```
    pub fn new(config: MokaStoreConfig) -> Self {
        let mut builder = Cache::builder();

        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        MokaStore {
            cache: builder.build(),
        }
    }

    /// Get cache statistics (for monitoring/debugging).
    pub fn stats(&self) -> (u64, u64) {
        let entry_count = self.cache.entry_count();
        let weighted_size = self.cache.weighted_size();
        (entry_count, weighted_size)
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        MokaStore::new(MokaStoreConfig::default())
    }
}

#[async_trait]
impl Store for MokaStore {
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, ResourceError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), ResourceError> {
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), ResourceError> {
        for key in keys {
            self.cache.invalidate(*key).await;
        }

        Ok(())
    }

    async fn remove_where(&self, predicate: KeyPredicate<'_>) -> Result<usize, ResourceError> {
        // Collect first: the iterator must not live across an await
        let matching: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| predicate(key.as_str()))
            .map(|(key, _)| key)
            .collect();

        for key in &matching {
            self.cache.invalidate(key.as_str()).await;
        }

        Ok(matching.len())
    }

    async fn clear(&self) -> Result<(), ResourceError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
