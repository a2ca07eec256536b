//! Builder API for creating engine instances.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::events::{EventSink, TracingSink};
use crate::fetch::{FetchExecutor, Fetcher, Plugin};
use crate::registry::ResourceRegistry;
use crate::store::Store;
use crate::stores::memory::HashMapStore;
use crate::swr::SwrEngine;

/// Builder for an [`SwrEngine`].
///
/// Everything except the registry and the transport has a default: an empty
/// `HashMapStore`, the system clock, a `TracingSink` and no plugins.
///
/// # Example
///
/// ```ignore
/// let registry = ResourceRegistry::from_config(Config::from_path("resources.json")?)?;
///
/// let engine = SwrEngine::builder(registry, Arc::new(ReqwestFetcher::new().base_url(API)))
///     .plugin(Arc::new(AuthPlugin::new(token)))
///     .store(Arc::new(MokaStore::default()))
///     .build();
///
/// let users = engine.read("users", None).await?;
/// ```
pub struct SwrEngineBuilder {
    registry: ResourceRegistry,
    fetcher: Arc<dyn Fetcher>,
    plugins: Vec<Arc<dyn Plugin>>,
    store: Option<Arc<dyn Store>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SwrEngineBuilder {
    /// Create a new SwrEngineBuilder.
    pub fn new(registry: ResourceRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        SwrEngineBuilder {
            registry,
            fetcher,
            plugins: Vec::new(),
            store: None,
            events: None,
            clock: None,
        }
    }

    /// Append a request plugin. Plugins run in the order they are added.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Use `store` for cache entries. It must not be shared with another engine.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Report engine events to `events`.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Use `clock` for expiry decisions.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine.
    pub fn build(self) -> SwrEngine {
        let executor = self
            .plugins
            .into_iter()
            .fold(FetchExecutor::new(self.fetcher), FetchExecutor::with_plugin);

        SwrEngine::from_parts(
            self.registry,
            self.store.unwrap_or_else(|| Arc::new(HashMapStore::new())),
            executor,
            self.events.unwrap_or_else(|| Arc::new(TracingSink)),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        )
    }
}
