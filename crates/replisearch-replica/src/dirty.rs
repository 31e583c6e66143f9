//! Cached, lazily-recomputed dirty/in-sync judgement.
//!
//! Every mutating call against the facade marks the state dirty. Whether
//! master and cache are actually at the same segment generation is only
//! recomputed when someone asks *and* the flag is set, so the steady-state
//! read path (no active writers) costs one atomic load and the probe runs
//! once per burst of writes.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use replisearch_core::traits::{Directory, GenerationProbe};
use tracing::debug;

use crate::mutex::lock_unpoisoned;

/// Tracks whether the cache is provably at the master's generation.
#[derive(Debug)]
pub struct SyncStateTracker {
    /// Set on every mutating call; cleared when the judgement recomputes.
    dirty: AtomicBool,
    /// Latest judgement. Only meaningful once `computed` is set.
    in_sync: AtomicBool,
    computed: AtomicBool,
    /// Serializes recomputation so the probe runs once per dirty burst.
    recompute: Mutex<()>,
}

impl Default for SyncStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateTracker {
    /// A fresh tracker starts dirty: the first check always probes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            in_sync: AtomicBool::new(false),
            computed: AtomicBool::new(false),
            recompute: Mutex::new(()),
        }
    }

    /// Record that a mutation is structurally underway or completed.
    ///
    /// Called *before* a write stream is handed out, so no concurrent
    /// reader can observe a stale "clean" state while bytes are moving.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether a mutation has been recorded since the last recomputation.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// The in-sync judgement, recomputing it if a mutation intervened.
    ///
    /// Clean path: one atomic load, no probe. Dirty path: under a
    /// double-checked critical section, probe the highest generation
    /// visible on each side independently; the sides are in sync iff both
    /// generations are known and equal. Probe failures surface as
    /// "unknown", never as errors, so transient master unavailability
    /// degrades routing instead of breaking reads.
    pub fn check_in_sync(
        &self,
        master: &dyn Directory,
        cache: &dyn Directory,
        probe: &dyn GenerationProbe,
    ) -> bool {
        if !self.dirty.load(Ordering::Acquire) && self.computed.load(Ordering::Acquire) {
            return self.in_sync.load(Ordering::Acquire);
        }

        let _guard = lock_unpoisoned(&self.recompute);
        if !self.dirty.load(Ordering::Acquire) && self.computed.load(Ordering::Acquire) {
            // Another thread recomputed while we waited for the section.
            return self.in_sync.load(Ordering::Acquire);
        }

        // Claim the recompute before probing: a mutation that lands while
        // the probe runs re-marks the flag and forces the next check to
        // probe again, instead of being erased by our clear.
        self.dirty.store(false, Ordering::Release);

        let master_generation = probe.current_generation(master);
        let cache_generation = probe.current_generation(cache);
        let in_sync = master_generation.matches(cache_generation);

        self.in_sync.store(in_sync, Ordering::Release);
        self.computed.store(true, Ordering::Release);

        debug!(
            target: "replisearch",
            master_generation = %master_generation,
            cache_generation = %cache_generation,
            in_sync,
            "sync state recomputed"
        );
        in_sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use replisearch_core::error::ReplicaResult;
    use replisearch_core::traits::{IndexLock, ReadStream, WriteStream};
    use replisearch_core::types::{DirectoryIdentity, FileEntry, SegmentGeneration};

    /// Directory stub: the probe below never touches it.
    #[derive(Debug)]
    struct NullDirectory(DirectoryIdentity);

    impl Directory for NullDirectory {
        fn identity(&self) -> &DirectoryIdentity {
            &self.0
        }
        fn list_all(&self) -> ReplicaResult<Vec<FileEntry>> {
            Ok(Vec::new())
        }
        fn file_exists(&self, _name: &str) -> ReplicaResult<bool> {
            Ok(false)
        }
        fn file_length(&self, _name: &str) -> ReplicaResult<u64> {
            Ok(0)
        }
        fn file_modified(&self, _name: &str) -> ReplicaResult<std::time::SystemTime> {
            Ok(std::time::SystemTime::UNIX_EPOCH)
        }
        fn open_read(&self, _name: &str) -> ReplicaResult<Box<dyn ReadStream>> {
            unimplemented!("not exercised")
        }
        fn open_write(&self, _name: &str) -> ReplicaResult<Box<dyn WriteStream>> {
            unimplemented!("not exercised")
        }
        fn delete(&self, _name: &str) -> ReplicaResult<()> {
            Ok(())
        }
        fn make_lock(&self, _name: &str) -> Box<dyn IndexLock> {
            unimplemented!("not exercised")
        }
    }

    /// Probe that counts invocations and serves scripted generations.
    #[derive(Debug)]
    struct ScriptedProbe {
        calls: AtomicUsize,
        master: SegmentGeneration,
        cache: SegmentGeneration,
    }

    impl ScriptedProbe {
        fn new(master: SegmentGeneration, cache: SegmentGeneration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                master,
                cache,
            }
        }

        fn probes(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GenerationProbe for ScriptedProbe {
        fn current_generation(&self, dir: &dyn Directory) -> SegmentGeneration {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if dir.identity().as_str() == "master" {
                self.master
            } else {
                self.cache
            }
        }
    }

    fn fixtures() -> (NullDirectory, NullDirectory) {
        (
            NullDirectory(DirectoryIdentity::new("master")),
            NullDirectory(DirectoryIdentity::new("cache")),
        )
    }

    #[test]
    fn equal_known_generations_are_in_sync() {
        let (master, cache) = fixtures();
        let probe = ScriptedProbe::new(SegmentGeneration::At(4), SegmentGeneration::At(4));
        let tracker = SyncStateTracker::new();
        assert!(tracker.check_in_sync(&master, &cache, &probe));
    }

    #[test]
    fn unknown_generation_is_never_in_sync() {
        let (master, cache) = fixtures();
        let probe = ScriptedProbe::new(SegmentGeneration::Unknown, SegmentGeneration::Unknown);
        let tracker = SyncStateTracker::new();
        assert!(!tracker.check_in_sync(&master, &cache, &probe));
    }

    #[test]
    fn repeated_checks_probe_exactly_once() {
        let (master, cache) = fixtures();
        let probe = ScriptedProbe::new(SegmentGeneration::At(1), SegmentGeneration::At(1));
        let tracker = SyncStateTracker::new();

        for _ in 0..5 {
            assert!(tracker.check_in_sync(&master, &cache, &probe));
        }
        // One check recomputed (two generation probes); four served cached.
        assert_eq!(probe.probes(), 2);
    }

    #[test]
    fn mark_dirty_forces_a_fresh_probe() {
        let (master, cache) = fixtures();
        let probe = ScriptedProbe::new(SegmentGeneration::At(1), SegmentGeneration::At(1));
        let tracker = SyncStateTracker::new();

        tracker.check_in_sync(&master, &cache, &probe);
        tracker.mark_dirty();
        assert!(tracker.is_dirty());
        tracker.check_in_sync(&master, &cache, &probe);
        assert!(!tracker.is_dirty());
        assert_eq!(probe.probes(), 4);
    }

    #[test]
    fn mismatched_generations_route_away_from_cache() {
        let (master, cache) = fixtures();
        let probe = ScriptedProbe::new(SegmentGeneration::At(9), SegmentGeneration::At(7));
        let tracker = SyncStateTracker::new();
        assert!(!tracker.check_in_sync(&master, &cache, &probe));
    }
}
