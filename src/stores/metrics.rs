//! Store decorator reporting per-resource cache metrics.
//!
//! Every store call becomes one [`CacheMetric`], tagged with the resource its
//! key belongs to, so hit ratios and write rates can be tracked per resource.
//!
//! ```ignore
//! let sink = Arc::new(PrometheusSink::new());
//! let store = MetricsStore::new(Arc::new(MokaStore::default()), sink.clone());
//!
//! let engine = SwrEngine::builder(registry, fetcher)
//!     .store(Arc::new(store))
//!     .build();
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::entry::CacheEntry;
use crate::error::ResourceError;
use crate::store::{KeyPredicate, Store};
use crate::utils::resource_of;

/// What a lookup found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupStatus {
    Miss,
    /// Not expired.
    Fresh,
    /// Expired, no refresh running.
    Stale,
    /// A refresh is running; the entry may still be fresh.
    Revalidating,
}

impl LookupStatus {
    fn of(entry: Option<&CacheEntry>, now_ms: i64) -> Self {
        match entry {
            None => LookupStatus::Miss,
            Some(entry) if entry.is_revalidating => LookupStatus::Revalidating,
            Some(entry) if entry.is_fresh(now_ms) => LookupStatus::Fresh,
            Some(_) => LookupStatus::Stale,
        }
    }

    pub fn is_hit(self) -> bool {
        self != LookupStatus::Miss
    }
}

/// One observed store call.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMetric {
    Lookup {
        resource: String,
        key: String,
        status: LookupStatus,
        latency: Duration,
    },
    Write {
        resource: String,
        key: String,
        /// Whether the written entry is flagged as refreshing.
        revalidating: bool,
        latency: Duration,
    },
    /// Targeted or predicate removal.
    Remove { removed: usize, latency: Duration },
    Clear { latency: Duration },
    /// The wrapped store returned an error.
    Failed { operation: &'static str, error: ResourceError },
}

/// Receives metrics from a [`MetricsStore`].
///
/// `emit` runs inline with every store call; buffer and export in `flush`.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// `store` is the wrapped store's name.
    fn emit(&self, store: &'static str, metric: CacheMetric);

    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A [`Store`] wrapper that reports every call to a [`MetricsSink`].
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
}

impl MetricsStore {
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        MetricsStore {
            inner,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    /// Classify lookups with `clock`. Pass the engine's clock when it is not
    /// the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn report<T>(
        &self,
        operation: &'static str,
        result: &Result<T, ResourceError>,
        metric: impl FnOnce(&T) -> CacheMetric,
    ) {
        let metric = match result {
            Ok(value) => metric(value),
            Err(error) => CacheMetric::Failed {
                operation,
                error: error.clone(),
            },
        };
        self.sink.emit(self.inner.name(), metric);
    }
}

#[async_trait]
impl Store for MetricsStore {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, ResourceError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let latency = start.elapsed();

        self.report("get", &result, |entry| CacheMetric::Lookup {
            resource: resource_of(key).to_string(),
            key: key.to_string(),
            status: LookupStatus::of(entry.as_ref(), self.clock.now_ms()),
            latency,
        });
        result
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), ResourceError> {
        let revalidating = entry.is_revalidating;
        let start = Instant::now();
        let result = self.inner.set(key, entry).await;
        let latency = start.elapsed();

        self.report("set", &result, |_| CacheMetric::Write {
            resource: resource_of(key).to_string(),
            key: key.to_string(),
            revalidating,
            latency,
        });
        result
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), ResourceError> {
        let start = Instant::now();
        let result = self.inner.remove(keys).await;
        let latency = start.elapsed();

        self.report("remove", &result, |_| CacheMetric::Remove {
            removed: keys.len(),
            latency,
        });
        result
    }

    async fn remove_where(&self, predicate: KeyPredicate<'_>) -> Result<usize, ResourceError> {
        let start = Instant::now();
        let result = self.inner.remove_where(predicate).await;
        let latency = start.elapsed();

        self.report("remove_where", &result, |removed| CacheMetric::Remove {
            removed: *removed,
            latency,
        });
        result
    }

    async fn clear(&self) -> Result<(), ResourceError> {
        let start = Instant::now();
        let result = self.inner.clear().await;
        let latency = start.elapsed();

        self.report("clear", &result, |_| CacheMetric::Clear { latency });
        result
    }
}
