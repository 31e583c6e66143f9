//! The master/cache synchronizing [`Directory`] facade.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use replisearch_core::config::ReplicaConfig;
use replisearch_core::error::ReplicaResult;
use replisearch_core::traits::{
    Directory, GenerationProbe, IndexLock, ReadStream, WriteStream,
};
use replisearch_core::types::{DirectoryIdentity, FileEntry};
use tracing::debug;

use crate::compound_lock::CompoundLock;
use crate::dirty::SyncStateTracker;
use crate::metrics::{ReplicaMetrics, ReplicaMetricsSnapshot};
use crate::mutex::FileMutexRegistry;
use crate::transfer::{CompressionPolicy, ReplicatedWriter, needs_refresh, pull_to_cache};

/// Presents {master, cache} as one uniform virtual-file directory.
///
/// Metadata calls (`list_all`, `file_exists`, `file_length`,
/// `file_modified`) are served from the cache while it is provably in
/// sync, from the master otherwise. `open_read` always runs the
/// copy-on-read refresh decision regardless of that routing — byte-for-byte
/// correctness, not metadata convenience, is what matters there.
/// `open_write` marks the directory dirty before handing out the stream,
/// and the stream pushes to the master on close. Locks made here require
/// agreement from both sides.
#[derive(Debug)]
pub struct SyncDirectory {
    identity: DirectoryIdentity,
    master: Arc<dyn Directory>,
    cache: Arc<dyn Directory>,
    probe: Arc<dyn GenerationProbe>,
    state: Arc<SyncStateTracker>,
    mutexes: Arc<FileMutexRegistry>,
    policy: CompressionPolicy,
    modified_tolerance: Duration,
    metrics: Arc<ReplicaMetrics>,
}

impl SyncDirectory {
    /// Build the facade over a master/cache pair.
    ///
    /// The facade's identity is the master's: the master location is the
    /// logical index; caches are per-process conveniences.
    pub fn new(
        master: Arc<dyn Directory>,
        cache: Arc<dyn Directory>,
        probe: Arc<dyn GenerationProbe>,
        config: &ReplicaConfig,
    ) -> Self {
        Self {
            identity: master.identity().clone(),
            master,
            cache,
            probe,
            state: Arc::new(SyncStateTracker::new()),
            mutexes: Arc::new(FileMutexRegistry::new()),
            policy: CompressionPolicy::new(config.compressed_suffixes.clone()),
            modified_tolerance: config.modified_tolerance(),
            metrics: Arc::new(ReplicaMetrics::default()),
        }
    }

    /// Whether master and cache are currently judged to be at the same
    /// committed generation. Recomputes lazily after mutations.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.state
            .check_in_sync(&*self.master, &*self.cache, &*self.probe)
    }

    /// Transfer telemetry for this facade.
    #[must_use]
    pub fn metrics_snapshot(&self) -> ReplicaMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The authoritative side.
    #[must_use]
    pub fn master(&self) -> &Arc<dyn Directory> {
        &self.master
    }

    /// The local fast side.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn Directory> {
        &self.cache
    }

    /// Metadata routing: cache when in sync, master otherwise.
    fn metadata_side(&self) -> &dyn Directory {
        if self.in_sync() {
            self.metrics.record_cache_hit();
            &*self.cache
        } else {
            &*self.master
        }
    }

    /// Refresh the cached copy of `name` if the three-test decision says
    /// the cache is not current, then report whether a pull happened.
    fn refresh_if_needed(&self, name: &str) -> ReplicaResult<bool> {
        if !needs_refresh(
            &*self.master,
            &*self.cache,
            name,
            &self.policy,
            self.modified_tolerance,
        )? {
            return Ok(false);
        }
        pull_to_cache(
            &*self.master,
            &*self.cache,
            name,
            &self.policy,
            &self.mutexes,
            &self.metrics,
        )?;
        // The pull changed the cache; the cached in-sync judgement is
        // stale until the next check re-probes both sides.
        self.state.mark_dirty();
        Ok(true)
    }
}

impl Directory for SyncDirectory {
    fn identity(&self) -> &DirectoryIdentity {
        &self.identity
    }

    fn list_all(&self) -> ReplicaResult<Vec<FileEntry>> {
        self.metadata_side().list_all()
    }

    fn file_exists(&self, name: &str) -> ReplicaResult<bool> {
        self.metadata_side().file_exists(name)
    }

    fn file_length(&self, name: &str) -> ReplicaResult<u64> {
        self.metadata_side().file_length(name)
    }

    fn file_modified(&self, name: &str) -> ReplicaResult<SystemTime> {
        self.metadata_side().file_modified(name)
    }

    /// Copy-on-read: make the cached copy current, then serve it.
    fn open_read(&self, name: &str) -> ReplicaResult<Box<dyn ReadStream>> {
        self.refresh_if_needed(name)?;
        self.cache.open_read(name)
    }

    /// Copy-on-write: the directory is dirty from the moment a write is
    /// structurally underway, before any caller sees the stream.
    fn open_write(&self, name: &str) -> ReplicaResult<Box<dyn WriteStream>> {
        self.state.mark_dirty();
        let writer = ReplicatedWriter::open(
            name,
            Arc::clone(&self.master),
            Arc::clone(&self.cache),
            Arc::clone(&self.state),
            Arc::clone(&self.mutexes),
            self.policy.clone(),
            Arc::clone(&self.metrics),
        )?;
        Ok(Box::new(writer))
    }

    /// Cache first. A cache-side failure propagates untouched before the
    /// master copy is approached, so a retry cannot lose the only copy.
    fn delete(&self, name: &str) -> ReplicaResult<()> {
        let was_on_cache = self.cache.file_exists(name)?;
        self.cache.delete(name)?;
        if was_on_cache {
            self.state.mark_dirty();
            self.metrics.record_delete();
        }

        let was_on_master = self.master.file_exists(name)?;
        self.master.delete(name)?;
        if was_on_master {
            self.state.mark_dirty();
            if !was_on_cache {
                self.metrics.record_delete();
            }
        }
        debug!(target: "replisearch", file = name, "deleted through facade");
        Ok(())
    }

    fn make_lock(&self, name: &str) -> Box<dyn IndexLock> {
        Box::new(CompoundLock::new(
            self.master.make_lock(name),
            self.cache.make_lock(name),
        ))
    }
}
