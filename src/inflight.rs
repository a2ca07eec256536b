//! Registry of in-flight revalidations.
//!
//! Each key has at most one registered operation. An operation moves from
//! "no entry" to "in flight" with [`InFlightRegistry::begin`], an atomic
//! check-and-register, and back with [`InFlightRegistry::finish`] or an
//! invalidation. Operations carry an id so a late `finish` never removes a
//! newer registration for the same key.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ResourceError;

/// What a revalidation resolves to.
pub type Outcome = Result<Value, ResourceError>;

/// A revalidation any number of callers can await.
pub type SharedOperation = Shared<BoxFuture<'static, Outcome>>;

/// A registered operation.
#[derive(Clone)]
pub struct InFlight {
    pub id: u64,
    pub future: SharedOperation,
}

/// Result of [`InFlightRegistry::begin`].
pub enum Registration {
    /// An operation was already in flight for the key.
    Joined(InFlight),
    /// A new operation was registered. The caller must drive it.
    Started(InFlight),
}

#[cfg(test)]
impl Registration {
    fn into_inner(self) -> InFlight {
        match self {
            Registration::Joined(op) | Registration::Started(op) => op,
        }
    }
}

#[derive(Default)]
pub struct InFlightRegistry {
    next_id: AtomicU64,
    operations: Mutex<HashMap<String, InFlight>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        InFlightRegistry::default()
    }

    /// Join the operation in flight for `key`, or register a new one built by `make`.
    ///
    /// `make` receives the new operation's id and must not perform I/O: it runs
    /// under the registry lock and only builds the (lazy) future.
    pub fn begin<F>(&self, key: &str, make: F) -> Registration
    where
        F: FnOnce(u64) -> BoxFuture<'static, Outcome>,
    {
        let mut operations = self.operations.lock();

        if let Some(existing) = operations.get(key) {
            return Registration::Joined(existing.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = InFlight {
            id,
            future: make(id).shared(),
        };
        operations.insert(key.to_string(), op.clone());
        Registration::Started(op)
    }

    /// Whether operation `id` is still the registered one for `key`.
    pub fn is_current(&self, key: &str, id: u64) -> bool {
        self.operations
            .lock()
            .get(key)
            .is_some_and(|op| op.id == id)
    }

    /// Whether any operation is registered for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.operations.lock().contains_key(key)
    }

    /// Deregister operation `id`. Returns false if it was already gone.
    pub fn finish(&self, key: &str, id: u64) -> bool {
        let mut operations = self.operations.lock();
        match operations.get(key) {
            Some(op) if op.id == id => {
                operations.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Deregister every operation whose key matches. The futures keep running.
    pub fn remove_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut operations = self.operations.lock();
        let before = operations.len();
        operations.retain(|key, _| !predicate(key));
        before - operations.len()
    }

    pub fn clear(&self) {
        self.operations.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counted(calls: Arc<AtomicUsize>, value: Value) -> BoxFuture<'static, Outcome> {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_begin_joins_existing_operation() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = registry.begin("users", |_| counted(calls.clone(), json!(1)));
        let second = registry.begin("users", |_| counted(calls.clone(), json!(2)));

        let (first, second) = match (first, second) {
            (Registration::Started(a), Registration::Joined(b)) => (a, b),
            _ => panic!("expected Started then Joined"),
        };
        assert_eq!(first.id, second.id);

        assert_eq!(first.future.await, Ok(json!(1)));
        assert_eq!(second.future.await, Ok(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_only_removes_matching_id() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let old = registry
            .begin("users", |_| counted(calls.clone(), json!(1)))
            .into_inner();
        assert_eq!(registry.remove_where(|key| key == "users"), 1);

        let new = registry
            .begin("users", |_| counted(calls.clone(), json!(2)))
            .into_inner();
        assert_ne!(old.id, new.id);

        // The invalidated operation settles late
        assert!(!registry.is_current("users", old.id));
        assert!(!registry.finish("users", old.id));
        assert!(registry.is_current("users", new.id));

        assert!(registry.contains("users"));
        assert!(registry.finish("users", new.id));
        assert!(!registry.finish("users", new.id));
        assert!(!registry.contains("users"));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_begin_registers_once() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    let op = registry
                        .begin("users", |_| counted(calls, json!("once")))
                        .into_inner();
                    op.future.await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(json!("once")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
