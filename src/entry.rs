use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached resource payload and its revalidation state.
///
/// Entries are replaced as a whole; a reader never observes a half-updated entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached payload.
    pub payload: Value,

    /// Unix timestamp in milliseconds.
    /// Before this time the entry is fresh and served without any network call.
    pub expires_at: i64,

    /// The entry has expired and was served stale at least once.
    pub is_stale: bool,

    /// A revalidation for this key is in flight.
    pub is_revalidating: bool,

    /// Unix timestamp in milliseconds of the last successful fetch.
    pub last_revalidated: i64,
}

/// Snapshot of an entry's revalidation state, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub is_stale: bool,
    pub is_revalidating: bool,
    pub last_revalidated: i64,
    pub expires_at: i64,
}

impl CacheEntry {
    /// Create a fresh entry fetched at `now_ms` and valid for `ttl_ms`.
    pub fn fresh(payload: Value, now_ms: i64, ttl_ms: i64) -> Self {
        CacheEntry {
            payload,
            expires_at: now_ms.saturating_add(ttl_ms),
            is_stale: false,
            is_revalidating: false,
            last_revalidated: now_ms,
        }
    }

    /// Check if the entry is still fresh.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    /// Check if the entry has passed its expiry.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        !self.is_fresh(now_ms)
    }

    /// The same entry with a revalidation marked in flight.
    ///
    /// `stale` is only honored for expired entries.
    pub fn revalidating(&self, now_ms: i64, stale: bool) -> Self {
        CacheEntry {
            is_revalidating: true,
            is_stale: self.is_stale || (stale && self.is_expired(now_ms)),
            ..self.clone()
        }
    }

    /// The same entry after a failed revalidation: payload and staleness kept.
    pub fn revalidation_failed(&self) -> Self {
        CacheEntry {
            is_revalidating: false,
            ..self.clone()
        }
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            is_stale: self.is_stale,
            is_revalidating: self.is_revalidating,
            last_revalidated: self.last_revalidated,
            expires_at: self.expires_at,
        }
    }
}
