use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::builder::SwrEngineBuilder;
use crate::clock::Clock;
use crate::entry::{CacheEntry, CacheStatus};
use crate::error::ResourceError;
use crate::events::{EventSink, SwrEvent};
use crate::fetch::{FetchExecutor, Fetcher, Method};
use crate::inflight::{InFlightRegistry, Outcome, Registration, SharedOperation};
use crate::registry::{Operation, Params, ResourceDescriptor, ResourceRegistry};
use crate::store::Store;
use crate::utils::{build_key, key_belongs_to};

/// Stale-while-revalidate engine over a registry of resources.
///
/// The engine owns its cache store and in-flight registry. Clones share them;
/// separately built engines never do.
///
/// Reads follow the SWR policy:
/// - no entry: fetch, cache and return the payload (concurrent readers share the fetch)
/// - fresh entry: return it
/// - expired entry: return it, and refresh it in the background unless a
///   refresh is already running
///
/// Writes go to the network and then drop every cache entry of the resource.
#[derive(Clone)]
pub struct SwrEngine {
    inner: Arc<Inner>,
}

struct Inner {
    registry: ResourceRegistry,
    store: Arc<dyn Store>,
    in_flight: InFlightRegistry,
    executor: FetchExecutor,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    /// Serializes every engine write to the store together with the
    /// in-flight check that guards it. Plain reads never take it.
    commit: Mutex<()>,
}

impl SwrEngine {
    /// Start building an engine.
    pub fn builder(registry: ResourceRegistry, fetcher: Arc<dyn Fetcher>) -> SwrEngineBuilder {
        SwrEngineBuilder::new(registry, fetcher)
    }

    /// An engine with the default store, clock and event sink, and no plugins.
    pub fn new(registry: ResourceRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::builder(registry, fetcher).build()
    }

    pub(crate) fn from_parts(
        registry: ResourceRegistry,
        store: Arc<dyn Store>,
        executor: FetchExecutor,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::debug!(
            resources = ?registry.names(),
            store = store.name(),
            "resource engine ready"
        );
        SwrEngine {
            inner: Arc::new(Inner {
                registry,
                store,
                in_flight: InFlightRegistry::new(),
                executor,
                events,
                clock,
                commit: Mutex::new(()),
            }),
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.inner.registry
    }

    /// Read a resource.
    ///
    /// Only a cache miss waits for the network. Resources without a cache
    /// lifetime are fetched on every call and never stored.
    pub async fn read(&self, resource: &str, params: Option<&Params>) -> Result<Value, ResourceError> {
        let descriptor = self.inner.registry.resolve(resource)?;
        let Some(ttl_ms) = descriptor.ttl_ms() else {
            return self.fetch_payload(&descriptor, params).await;
        };

        let key = build_key(resource, params);
        let now = self.inner.clock.now_ms();

        match self.inner.store.get(&key).await? {
            Some(entry) if entry.is_fresh(now) => Ok(entry.payload),
            Some(entry) => {
                // A flag without a registered refresh is left over from a failed store write
                if !(entry.is_revalidating && self.inner.in_flight.contains(&key))
                    && let Err(e) = self.refresh_stale(&key, &descriptor, params, ttl_ms).await
                {
                    tracing::warn!(key = %key, error = %e, "failed to start background refresh");
                }
                self.inner.events.emit(SwrEvent::StaleServed { key });
                Ok(entry.payload)
            }
            None => {
                let op = self
                    .join_or_start(&key, &descriptor, params, ttl_ms)
                    .await?;
                op.await
            }
        }
    }

    /// Read a resource and deserialize the payload.
    pub async fn read_as<T>(&self, resource: &str, params: Option<&Params>) -> Result<T, ResourceError>
    where
        T: DeserializeOwned,
    {
        let payload = self.read(resource, params).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Refresh a key now and wait for the result.
    ///
    /// Joins the refresh already in flight, if any. Returns the cached payload
    /// once the refresh settles, or `ResourceError::Revalidation` when nothing
    /// is cached afterwards (failed first fetch, or invalidated meanwhile).
    ///
    /// `Ok` does not mean fresh: when the refresh fails but an entry is cached,
    /// the stale payload is returned and the failure is reported as
    /// `SwrEvent::RevalidationFailed`. Check `cache_status` to tell them apart.
    pub async fn revalidate(
        &self,
        resource: &str,
        params: Option<&Params>,
    ) -> Result<Value, ResourceError> {
        let descriptor = self.inner.registry.resolve(resource)?;
        let Some(ttl_ms) = descriptor.ttl_ms() else {
            return self.fetch_payload(&descriptor, params).await;
        };

        let key = build_key(resource, params);
        let op = self
            .join_or_start(&key, &descriptor, params, ttl_ms)
            .await?;

        // Failures were already reported; the cache decides what we return
        let _ = op.await;

        match self.inner.store.get(&key).await? {
            Some(entry) => Ok(entry.payload),
            None => Err(ResourceError::Revalidation { key }),
        }
    }

    /// Perform a write and invalidate the resource's cache entries.
    ///
    /// `id` fills the `:id` placeholder and takes precedence over an `id` in
    /// `params`. On failure the error is returned and the cache is untouched.
    pub async fn mutate(
        &self,
        resource: &str,
        operation: Operation,
        id: Option<Value>,
        body: Option<Value>,
        params: Option<&Params>,
    ) -> Result<Value, ResourceError> {
        if operation == Operation::Read {
            return Err(ResourceError::InvalidOperation { operation });
        }

        let descriptor = self.inner.registry.resolve(resource)?;

        let mut path_params = params.cloned().unwrap_or_default();
        if let Some(id) = id {
            path_params.insert("id".to_string(), id);
        }

        let url = self
            .inner
            .registry
            .url_for(&descriptor, operation, Some(&path_params))?;
        let response = self
            .inner
            .executor
            .execute(operation.method(), &url, body)
            .await?;

        self.invalidate_resource(resource, Some(operation)).await?;
        Ok(response.body)
    }

    /// Drop every cache entry of a resource and forget its in-flight refreshes.
    ///
    /// Refreshes already running finish, but their results are discarded.
    pub async fn invalidate(&self, resource: &str) -> Result<(), ResourceError> {
        self.invalidate_resource(resource, None).await
    }

    /// Drop the whole cache.
    pub async fn invalidate_all(&self) -> Result<(), ResourceError> {
        let _commit = self.inner.commit.lock().await;
        self.inner.store.clear().await?;
        self.inner.in_flight.clear();
        self.inner.events.emit(SwrEvent::Cleared);
        Ok(())
    }

    /// Revalidation state of a cached key, `None` when nothing is cached.
    pub async fn cache_status(
        &self,
        resource: &str,
        params: Option<&Params>,
    ) -> Result<Option<CacheStatus>, ResourceError> {
        let key = build_key(resource, params);
        let entry = self.inner.store.get(&key).await?;
        Ok(entry.as_ref().map(CacheEntry::status))
    }

    /// Number of refreshes currently registered.
    pub fn pending_revalidations(&self) -> usize {
        self.inner.in_flight.len()
    }

    async fn invalidate_resource(
        &self,
        resource: &str,
        operation: Option<Operation>,
    ) -> Result<(), ResourceError> {
        let matches = |key: &str| key_belongs_to(key, resource);

        let _commit = self.inner.commit.lock().await;
        let removed = self.inner.store.remove_where(&matches).await?;
        self.inner.in_flight.remove_where(&matches);

        self.inner.events.emit(SwrEvent::Invalidated {
            resource: resource.to_string(),
            operation,
            removed,
        });
        Ok(())
    }

    /// Start a background refresh of an expired entry, unless one is running
    /// or the entry was refreshed since the caller looked.
    async fn refresh_stale(
        &self,
        key: &str,
        descriptor: &Arc<ResourceDescriptor>,
        params: Option<&Params>,
        ttl_ms: i64,
    ) -> Result<(), ResourceError> {
        let _commit = self.inner.commit.lock().await;
        let now = self.inner.clock.now_ms();

        match self.inner.store.get(key).await? {
            Some(entry) if entry.is_expired(now) && !self.inner.in_flight.contains(key) => {
                self.register(key, descriptor, params, ttl_ms, true).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Join the refresh in flight for `key` or start one.
    async fn join_or_start(
        &self,
        key: &str,
        descriptor: &Arc<ResourceDescriptor>,
        params: Option<&Params>,
        ttl_ms: i64,
    ) -> Result<SharedOperation, ResourceError> {
        let _commit = self.inner.commit.lock().await;
        self.register(key, descriptor, params, ttl_ms, false).await
    }

    /// Register and spawn a refresh, then flag the cached entry.
    ///
    /// Callers hold the commit lock, so the refresh cannot settle before the
    /// flags are written.
    async fn register(
        &self,
        key: &str,
        descriptor: &Arc<ResourceDescriptor>,
        params: Option<&Params>,
        ttl_ms: i64,
        mark_stale: bool,
    ) -> Result<SharedOperation, ResourceError> {
        let registration = self.inner.in_flight.begin(key, |id| {
            self.revalidation(key, descriptor.clone(), params.cloned(), ttl_ms, id)
        });

        let op = match registration {
            Registration::Joined(op) => return Ok(op.future),
            Registration::Started(op) => op,
        };

        // Runs to completion whether or not anyone awaits it
        tokio::spawn(op.future.clone());
        self.inner.events.emit(SwrEvent::RevalidationStarted {
            key: key.to_string(),
        });

        if let Some(entry) = self.inner.store.get(key).await? {
            let now = self.inner.clock.now_ms();
            self.inner
                .store
                .set(key, entry.revalidating(now, mark_stale))
                .await?;
        }

        Ok(op.future)
    }

    /// The refresh itself: fetch, then settle into the cache.
    fn revalidation(
        &self,
        key: &str,
        descriptor: Arc<ResourceDescriptor>,
        params: Option<Params>,
        ttl_ms: i64,
        id: u64,
    ) -> BoxFuture<'static, Outcome> {
        let engine = self.clone();
        let key = key.to_string();

        async move {
            let outcome = engine.fetch_payload(&descriptor, params.as_ref()).await;
            engine.settle(&key, id, ttl_ms, &outcome).await;
            outcome
        }
        .boxed()
    }

    /// Commit a refresh result and deregister the refresh.
    ///
    /// A refresh that was invalidated while running leaves the cache alone.
    /// When the commit fails the entry is dropped, so no entry stays flagged
    /// as revalidating once the refresh is gone.
    async fn settle(&self, key: &str, id: u64, ttl_ms: i64, outcome: &Outcome) {
        let _commit = self.inner.commit.lock().await;

        if !self.inner.in_flight.is_current(key, id) {
            tracing::debug!(key, "refresh settled after invalidation, discarding result");
            return;
        }

        let committed = match outcome {
            Ok(payload) => {
                let now = self.inner.clock.now_ms();
                let entry = CacheEntry::fresh(payload.clone(), now, ttl_ms);
                self.inner.store.set(key, entry).await
            }
            Err(_) => match self.inner.store.get(key).await {
                Ok(Some(entry)) => self.inner.store.set(key, entry.revalidation_failed()).await,
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            },
        };

        if let Err(e) = committed {
            tracing::warn!(key, error = %e, "failed to store refresh result");
            if let Err(e) = self.inner.store.remove(&[key]).await {
                tracing::warn!(key, error = %e, "failed to drop entry after store error");
            }
        }
        self.inner.in_flight.finish(key, id);

        let event = match outcome {
            Ok(_) => SwrEvent::RevalidationSucceeded {
                key: key.to_string(),
            },
            Err(error) => SwrEvent::RevalidationFailed {
                key: key.to_string(),
                error: error.clone(),
            },
        };
        self.inner.events.emit(event);
    }

    /// Fetch the read endpoint and validate the payload.
    async fn fetch_payload(
        &self,
        descriptor: &ResourceDescriptor,
        params: Option<&Params>,
    ) -> Result<Value, ResourceError> {
        let url = self
            .inner
            .registry
            .url_for(descriptor, Operation::Read, params)?;
        let response = self.inner.executor.execute(Method::Get, &url, None).await?;

        if let Some(schema) = descriptor.validator()
            && let Err(e) = schema.validate(&response.body)
        {
            self.inner.events.emit(SwrEvent::ValidationFailed {
                resource: descriptor.name().to_string(),
                message: e.message,
            });
        }

        Ok(response.body)
    }
}
