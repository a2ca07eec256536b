use async_trait::async_trait;

use crate::entry::CacheEntry;
use crate::error::ResourceError;

/// Predicate over cache keys, used for bulk removal.
pub type KeyPredicate<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// A store is a common interface for storing, reading and deleting cache entries.
///
/// Stores are pure containers: they hold whatever the engine puts in them and
/// apply no freshness policy of their own. Writes replace the whole entry.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "hashmap"
    /// - "moka"
    fn name(&self) -> &'static str;

    /// Return the cached entry.
    ///
    /// The response must be `None` for cache misses.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, ResourceError>;

    /// Sets the entry for the given key, replacing any previous one.
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), ResourceError>;

    /// Removes the key(s) from the store.
    async fn remove(&self, keys: &[&str]) -> Result<(), ResourceError>;

    /// Removes every key matching the predicate and returns how many were removed.
    async fn remove_where(&self, predicate: KeyPredicate<'_>) -> Result<usize, ResourceError>;

    /// Removes everything.
    async fn clear(&self) -> Result<(), ResourceError>;
}
