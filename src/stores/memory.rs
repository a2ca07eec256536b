use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::entry::CacheEntry;
use crate::error::ResourceError;
use crate::store::{KeyPredicate, Store};

/// Thread-safe in-memory cache store using HashMap with RwLock.
///
/// Entries live until they are removed; expiry only changes how the engine
/// serves them. This is the default store of an engine.
///
/// For high-concurrency scenarios, consider using `MokaStore` instead.
#[derive(Default)]
pub struct HashMapStore {
    state: RwLock<HashMap<String, CacheEntry>>,
}

impl HashMapStore {
    /// Create an empty HashMapStore.
    pub fn new() -> Self {
        HashMapStore {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }
}

#[async_trait]
impl Store for HashMapStore {
    fn name(&self) -> &'static str {
        "hashmap"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, ResourceError> {
        let state = self.state.read().await;
        Ok(state.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), ResourceError> {
        let mut state = self.state.write().await;
        state.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), ResourceError> {
        let mut state = self.state.write().await;

        for key in keys {
            state.remove(*key);
        }

        Ok(())
    }

    async fn remove_where(&self, predicate: KeyPredicate<'_>) -> Result<usize, ResourceError> {
        let mut state = self.state.write().await;
        let before = state.len();
        state.retain(|key, _| !predicate(key));
        Ok(before - state.len())
    }

    async fn clear(&self) -> Result<(), ResourceError> {
        self.state.write().await.clear();
        Ok(())
    }
}
