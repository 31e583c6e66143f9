//! Per-file transfer mutexes.
//!
//! Exactly one transfer of a given file may be in flight at a time,
//! regardless of direction. The registry hands out a process-wide
//! primitive keyed by file name; entries are created on first use and
//! retained for the owning directory's lifetime, so the cost is bounded
//! by the number of distinct file names ever touched.
//!
//! Acquisition blocks without timeout: a stuck transfer makes the index
//! temporarily unusable rather than silently divergent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

/// Directory-scoped registry of per-file transfer mutexes.
#[derive(Debug, Default)]
pub struct FileMutexRegistry {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileMutexRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The transfer mutex for `name`, created on first use.
    ///
    /// Lock the returned primitive for the duration of the transfer:
    ///
    /// ```
    /// # use replisearch_replica::FileMutexRegistry;
    /// let registry = FileMutexRegistry::new();
    /// let mutex = registry.mutex_for("_0.idx");
    /// let _guard = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    /// // stream bytes while the guard is held
    /// ```
    #[must_use]
    pub fn mutex_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut entries = lock_unpoisoned(&self.entries);
        if let Some(existing) = entries.get(name) {
            return Arc::clone(existing);
        }
        trace!(target: "replisearch", file = name, "file mutex created");
        let created = Arc::new(Mutex::new(()));
        entries.insert(name.to_owned(), Arc::clone(&created));
        created
    }

    /// Number of distinct file names ever locked through this registry.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
/// The protected state here is a unit or a plain map, so a poisoned lock
/// carries no torn invariants worth dying over.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
