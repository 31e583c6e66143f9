//! Keyed get-or-create caches for process-wide resources.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use replisearch_core::error::{ReplicaError, ReplicaResult};
use tracing::debug;

/// An injectable registry of shared resources keyed by directory identity
/// (or any other hashable key).
///
/// `get_or_create` is an atomic get-or-insert: the factory runs at most
/// once per key even under concurrent first access, with races resolved
/// by the registry's own lock rather than by callers. `require_existing`
/// is lookup-only and fails with a distinct "not initialized" error, for
/// maintenance paths that must never implicitly create a resource.
///
/// Owned by the top-level service and passed down, never a language-level
/// static, so every test run gets a fresh one.
#[derive(Debug)]
pub struct ResourceRegistry<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> ResourceRegistry<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// An empty registry. `name` labels log lines and error messages.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The resource for `key`, creating it via `factory` on first access.
    ///
    /// The factory runs while the registry lock is held, which is what
    /// makes it at-most-once per key: a second caller for the same key
    /// blocks until the first finishes and then receives the same `Arc`.
    /// A factory error inserts nothing, so the next caller retries.
    pub fn get_or_create<F>(&self, key: &K, factory: F) -> ReplicaResult<Arc<V>>
    where
        F: FnOnce() -> ReplicaResult<V>,
    {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(key) {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(factory()?);
        entries.insert(key.clone(), Arc::clone(&created));
        debug!(
            target: "replisearch",
            registry = self.name,
            key = %key,
            entries = entries.len(),
            "resource created"
        );
        Ok(created)
    }

    /// The resource for `key`, or `NotInitialized` if no one created it.
    pub fn require_existing(&self, key: &K) -> ReplicaResult<Arc<V>> {
        lock(&self.entries)
            .get(key)
            .map(Arc::clone)
            .ok_or_else(|| ReplicaError::NotInitialized {
                registry: self.name,
                key: key.to_string(),
            })
    }

    /// Drop the registry's reference for `key`, returning it if present.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        lock(&self.entries).remove(key)
    }

    /// All keys currently registered.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        lock(&self.entries).keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
