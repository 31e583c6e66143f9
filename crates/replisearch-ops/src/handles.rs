//! Reference-counted, staleness-evicted tracking of open read handles.
//!
//! Every time a new search generation is opened the resulting handle is
//! registered here; the tracker's `Arc` clone is the reference it holds.
//! A periodic sweep closes handles past a staleness window, always
//! sparing the single most-recently-added handle (it is presumed to be
//! the live searcher). Handles are never force-closed while other owners
//! still hold references except through the explicit close-all paths used
//! at shutdown or full directory disposal — and even those only drop the
//! tracker's reference; the physical close happens when the last `Arc`
//! owner drops.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use replisearch_core::traits::SearchHandle;
use replisearch_core::types::DirectoryIdentity;
use tracing::debug;

struct TrackedHandle {
    handle: Arc<dyn SearchHandle>,
    opened_at: Instant,
    sequence: u64,
}

#[derive(Default)]
struct TrackerInner {
    entries: Vec<TrackedHandle>,
    next_sequence: u64,
}

/// Registry of outstanding read handles across the whole process.
#[derive(Default)]
pub struct ReadHandleTracker {
    inner: Mutex<TrackerInner>,
}

impl std::fmt::Debug for ReadHandleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadHandleTracker")
            .field("tracked", &self.tracked())
            .finish()
    }
}

impl ReadHandleTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened read handle.
    ///
    /// The tracker clones the `Arc`, which is the reference-count
    /// increment; the handle stays open at least until a sweep or a
    /// close-all drops that clone.
    pub fn add_open_handle(&self, handle: Arc<dyn SearchHandle>) {
        let mut inner = lock(&self.inner);
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        debug!(
            target: "replisearch",
            directory = %handle.directory(),
            sequence,
            "read handle tracked"
        );
        inner.entries.push(TrackedHandle {
            handle,
            opened_at: Instant::now(),
            sequence,
        });
    }

    /// Number of handles currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// Close every tracked handle whose age is at least `max_age`,
    /// unconditionally sparing the single most-recently-added handle.
    /// Returns the number closed.
    ///
    /// Intended for a periodic/background maintenance task, never the
    /// per-request path.
    pub fn close_stale_handles(&self, max_age: Duration) -> usize {
        let mut inner = lock(&self.inner);
        let Some(newest) = inner.entries.iter().map(|e| e.sequence).max() else {
            return 0;
        };
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|entry| {
            entry.sequence == newest || now.duration_since(entry.opened_at) < max_age
        });
        let closed = before - inner.entries.len();
        if closed > 0 {
            debug!(
                target: "replisearch",
                closed,
                remaining = inner.entries.len(),
                max_age_ms = max_age.as_millis(),
                "stale read handles released"
            );
        }
        closed
    }

    /// Force-drop every tracked handle for one directory, bypassing age
    /// and newest-handle exclusions. Returns the number closed.
    pub fn close_all_for(&self, directory: &DirectoryIdentity) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner
            .entries
            .retain(|entry| entry.handle.directory() != directory);
        before - inner.entries.len()
    }

    /// Force-drop every tracked handle. Returns the number closed.
    pub fn close_all(&self) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner.entries.clear();
        before
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
