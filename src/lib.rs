//! swr-resources - Resource-oriented data access with stale-while-revalidate caching
//!
//! Declare named resources with endpoint templates and an optional cache
//! lifetime, then read and write them through an [`SwrEngine`]:
//! - Reads are cached per resource and parameters, and stale entries are
//!   served while they refresh in the background
//! - Concurrent refreshes of the same key share one request
//! - Writes invalidate every cached entry of the resource
//! - Plugins hook into every request (auth headers, logging)
//!
//! # Example
//!
//! ```ignore
//! use swr_resources::{Config, ReqwestFetcher, ResourceRegistry, SwrEngine, Operation};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swr_resources::ResourceError> {
//!     let config = Config::from_json_str(r#"{
//!         "resources": {
//!             "users": { "read": "/users", "create": "/users", "cacheSeconds": 30 },
//!             "user": { "read": "/users/:id", "patch": "/users/:id", "cacheSeconds": 30 }
//!         }
//!     }"#)?;
//!
//!     let engine = SwrEngine::new(
//!         ResourceRegistry::from_config(config)?,
//!         Arc::new(ReqwestFetcher::new().base_url("https://api.example.com")),
//!     );
//!
//!     let users = engine.read("users", None).await?;
//!
//!     engine
//!         .mutate("users", Operation::Create, None, Some(json!({"name": "Ada"})), None)
//!         .await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod clock;
mod config;
mod entry;
mod error;
mod events;
mod fetch;
mod inflight;
mod registry;
mod schema;
mod store;
pub mod stores;
mod swr;
mod utils;

// Re-export public API
pub use builder::SwrEngineBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ResourceConfig};
pub use entry::{CacheEntry, CacheStatus};
pub use error::ResourceError;
pub use events::{EventSink, SwrEvent, TracingSink};
#[cfg(feature = "http")]
pub use fetch::ReqwestFetcher;
pub use fetch::{FetchExecutor, Fetcher, Method, Plugin, Request, Response};
pub use registry::{Operation, Params, RegistryBuilder, ResourceDescriptor, ResourceRegistry};
pub use schema::{RequiredFields, ValidationError, Validator};
pub use store::{KeyPredicate, Store};
pub use stores::memory::HashMapStore;
pub use stores::metrics::{CacheMetric, LookupStatus, MetricsSink, MetricsStore};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use swr::SwrEngine;
pub use utils::build_key;
