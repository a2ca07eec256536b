//! Store implementations for the cache engine.

pub mod memory;
pub mod metrics;
pub mod moka;

pub use memory::HashMapStore;
pub use metrics::{CacheMetric, LookupStatus, MetricsSink, MetricsStore};
pub use moka::{MokaStore, MokaStoreConfig};
