//! Copy-on-read and copy-on-write byte transfer between master and cache.
//!
//! Pulls stream master→cache when the cached copy is provably not current;
//! pushes stream cache→master when a write stream closes. Both directions
//! serialize per file through the [`FileMutexRegistry`], and both honor a
//! suffix-based compression policy: files matching a configured suffix are
//! stored deflated on the master, inflated on pull, and deflated in memory
//! before push. The cache always holds raw bytes, since that is what the
//! engine maps and reads.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use replisearch_core::error::ReplicaResult;
use replisearch_core::traits::{Directory, WriteStream};
use tracing::{debug, warn};

use crate::dirty::SyncStateTracker;
use crate::metrics::ReplicaMetrics;
use crate::mutex::{FileMutexRegistry, lock_unpoisoned};

// ─── Compression policy ─────────────────────────────────────────────────────

/// Suffix-based decision for which files travel deflated to the master.
#[derive(Debug, Clone, Default)]
pub struct CompressionPolicy {
    suffixes: Vec<String>,
}

impl CompressionPolicy {
    #[must_use]
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Whether the master-side copy of `name` is stored deflated.
    #[must_use]
    pub fn applies_to(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix))
    }
}

// ─── Refresh decision ───────────────────────────────────────────────────────

/// Decide whether the cached copy of `name` must be refreshed from master.
///
/// Three tests, in order: the cache file is absent; the byte lengths
/// differ; the lengths agree but the modification instants differ by more
/// than `tolerance` (the two stores timestamp independently and not
/// atomically). For names the compression policy covers, the master holds
/// deflated bytes, so the length comparison is meaningless and the
/// modified test alone decides.
///
/// A file absent on the master needs no refresh: the cache copy is the
/// only copy, which happens transiently between a cache write and its
/// push.
pub fn needs_refresh(
    master: &dyn Directory,
    cache: &dyn Directory,
    name: &str,
    policy: &CompressionPolicy,
    tolerance: Duration,
) -> ReplicaResult<bool> {
    if !cache.file_exists(name)? {
        return Ok(true);
    }
    if !master.file_exists(name)? {
        return Ok(false);
    }
    if !policy.applies_to(name) {
        let master_len = master.file_length(name)?;
        let cache_len = cache.file_length(name)?;
        if master_len != cache_len {
            debug!(
                target: "replisearch",
                file = name,
                master_len,
                cache_len,
                "length mismatch, cache refresh needed"
            );
            return Ok(true);
        }
    }
    let master_modified = master.file_modified(name)?;
    let cache_modified = cache.file_modified(name)?;
    Ok(!within_tolerance(master_modified, cache_modified, tolerance))
}

fn within_tolerance(a: SystemTime, b: SystemTime, tolerance: Duration) -> bool {
    match a.duration_since(b) {
        Ok(delta) => delta <= tolerance,
        Err(ahead) => ahead.duration() <= tolerance,
    }
}

// ─── Copy-on-read ───────────────────────────────────────────────────────────

/// Stream all bytes of `name` master→cache under the file's transfer
/// mutex, inflating when the compression policy covers the name.
///
/// Returns the number of raw bytes now present in the cache.
pub fn pull_to_cache(
    master: &dyn Directory,
    cache: &dyn Directory,
    name: &str,
    policy: &CompressionPolicy,
    mutexes: &FileMutexRegistry,
    metrics: &ReplicaMetrics,
) -> ReplicaResult<u64> {
    let mutex = mutexes.mutex_for(name);
    let _guard = lock_unpoisoned(&mutex);

    let source = master.open_read(name)?;
    let mut destination = cache.open_write(name)?;
    let bytes = if policy.applies_to(name) {
        let mut inflater = GzDecoder::new(source);
        std::io::copy(&mut inflater, &mut destination)?
    } else {
        let mut source = source;
        std::io::copy(&mut source, &mut destination)?
    };
    destination.close()?;

    metrics.record_pull(bytes);
    debug!(target: "replisearch", file = name, bytes, "cache refreshed from master");
    Ok(bytes)
}

// ─── Copy-on-write ──────────────────────────────────────────────────────────

/// Write stream that lands bytes in the cache first and pushes them to the
/// master when closed.
///
/// The cache copy is durable once `close` has flushed it, but the index
/// must be treated as not-yet-replicated until the push succeeds: any
/// failure pushing to master is surfaced synchronously from `close`, and
/// the completed write re-marks the directory dirty either way, since a
/// finished write is itself a pending mutation the master must reflect.
pub struct ReplicatedWriter {
    name: String,
    master: Arc<dyn Directory>,
    cache: Arc<dyn Directory>,
    state: Arc<SyncStateTracker>,
    mutexes: Arc<FileMutexRegistry>,
    policy: CompressionPolicy,
    metrics: Arc<ReplicaMetrics>,
    inner: Option<Box<dyn WriteStream>>,
    closed: bool,
}

impl std::fmt::Debug for ReplicatedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedWriter")
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ReplicatedWriter {
    pub(crate) fn open(
        name: &str,
        master: Arc<dyn Directory>,
        cache: Arc<dyn Directory>,
        state: Arc<SyncStateTracker>,
        mutexes: Arc<FileMutexRegistry>,
        policy: CompressionPolicy,
        metrics: Arc<ReplicaMetrics>,
    ) -> ReplicaResult<Self> {
        let inner = cache.open_write(name)?;
        Ok(Self {
            name: name.to_owned(),
            master,
            cache,
            state,
            mutexes,
            policy,
            metrics,
            inner: Some(inner),
            closed: false,
        })
    }

    fn push_to_master(&self) -> ReplicaResult<u64> {
        let mutex = self.mutexes.mutex_for(&self.name);
        let _guard = lock_unpoisoned(&mutex);

        let mut source = self.cache.open_read(&self.name)?;
        let mut destination = self.master.open_write(&self.name)?;
        let bytes = if self.policy.applies_to(&self.name) {
            let mut raw = Vec::new();
            source.read_to_end(&mut raw)?;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            let deflated = encoder.finish()?;
            destination.write_all(&deflated)?;
            deflated.len() as u64
        } else {
            std::io::copy(&mut source, &mut destination)?
        };
        destination.close()?;
        Ok(bytes)
    }
}

impl Write for ReplicatedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.write(buf),
            None => Err(std::io::Error::other("write stream already closed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl WriteStream for ReplicatedWriter {
    fn close(&mut self) -> ReplicaResult<()> {
        if self.closed {
            return Ok(());
        }
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        inner.close()?;
        drop(inner);

        let bytes = self.push_to_master()?;
        self.metrics.record_push(bytes);
        // The finished write is a pending mutation until the next
        // generation check observes the master reflecting it.
        self.state.mark_dirty();
        self.closed = true;

        debug!(
            target: "replisearch",
            file = %self.name,
            bytes,
            compressed = self.policy.applies_to(&self.name),
            "write replicated to master"
        );
        Ok(())
    }
}

impl Drop for ReplicatedWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                target: "replisearch",
                file = %self.name,
                "replicated write dropped without close; master was not updated"
            );
        }
    }
}
