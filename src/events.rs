//! Engine events.
//!
//! The engine reports what it does through an [`EventSink`]. Background
//! failures never reach a caller, so this is where they surface. The default
//! [`TracingSink`] turns events into `tracing` records.

use crate::error::ResourceError;
use crate::registry::Operation;

/// Something the engine did or observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SwrEvent {
    /// An expired entry was returned while a refresh runs.
    StaleServed { key: String },
    /// A revalidation was registered for the key.
    RevalidationStarted { key: String },
    /// A revalidation stored a fresh payload.
    RevalidationSucceeded { key: String },
    /// A revalidation failed; any cached payload was kept.
    RevalidationFailed { key: String, error: ResourceError },
    /// A payload did not pass its resource schema. It was used anyway.
    ValidationFailed { resource: String, message: String },
    /// Cache entries of one resource were dropped.
    Invalidated {
        resource: String,
        /// The mutation that caused it, if any.
        operation: Option<Operation>,
        /// Entries removed from the store.
        removed: usize,
    },
    /// The whole cache was dropped.
    Cleared,
}

/// Receives engine events.
///
/// Called synchronously on the engine's paths; keep implementations cheap.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SwrEvent);
}

/// Logs events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SwrEvent) {
        match event {
            SwrEvent::StaleServed { key } => {
                tracing::debug!(key = %key, "serving stale entry");
            }
            SwrEvent::RevalidationStarted { key } => {
                tracing::debug!(key = %key, "revalidation started");
            }
            SwrEvent::RevalidationSucceeded { key } => {
                tracing::debug!(key = %key, "revalidation succeeded");
            }
            SwrEvent::RevalidationFailed { key, error } => {
                tracing::warn!(key = %key, error = %error, "revalidation failed");
            }
            SwrEvent::ValidationFailed { resource, message } => {
                tracing::warn!(resource = %resource, "response failed validation: {}", message);
            }
            SwrEvent::Invalidated {
                resource,
                operation,
                removed,
            } => {
                tracing::debug!(
                    resource = %resource,
                    operation = operation.map(|op| op.as_str()).unwrap_or("manual"),
                    removed,
                    "cache invalidated"
                );
            }
            SwrEvent::Cleared => {
                tracing::debug!("cache cleared");
            }
        }
    }
}
