//! Top-level service owning the process-wide replication state.

use std::path::Path;
use std::sync::Arc;

use replisearch_core::config::ReplicaConfig;
use replisearch_core::error::ReplicaResult;
use replisearch_core::traits::{Directory, SearchHandle};
use replisearch_core::types::DirectoryIdentity;
use replisearch_engine::EngineWriter;
use replisearch_engine::probe::TantivyGenerationProbe;
use replisearch_ops::executive::{Executive, LeaderState};
use replisearch_ops::handles::ReadHandleTracker;
use replisearch_ops::registry::ResourceRegistry;
use replisearch_replica::directory::SyncDirectory;
use replisearch_replica::fs::FsDirectory;
use tantivy::Index;
use tracing::info;

/// Result of one periodic maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Read handles released by the staleness sweep.
    pub handles_closed: usize,
    /// Whether this node holds leadership after the pass.
    pub leading: bool,
}

/// One node's view of a replicated index fleet.
///
/// Owns the only intentionally process-wide mutable state: the directory
/// registry, the write-handle registry, the read-handle tracker, and the
/// executive. All of it is held here and injected downward rather than
/// living in statics, so every test run gets a fresh world.
///
/// Write handles are leadership-gated: [`ReplicaNode::writer_for`]
/// consults the executive before the registry, and a non-leader gets
/// `NotLeader` instead of a handle.
#[derive(Debug)]
pub struct ReplicaNode {
    config: ReplicaConfig,
    directories: ResourceRegistry<DirectoryIdentity, SyncDirectory>,
    writers: ResourceRegistry<DirectoryIdentity, EngineWriter>,
    handles: ReadHandleTracker,
    executive: Executive,
}

impl ReplicaNode {
    /// Build a node that coordinates through `records` (a location shared
    /// by the whole fleet, typically the master side).
    pub fn new(
        records: Arc<dyn Directory>,
        machine_id: impl Into<String>,
        config: ReplicaConfig,
    ) -> ReplicaResult<Self> {
        config.validate()?;
        let executive = Executive::new(records, machine_id, config.record_staleness());
        Ok(Self {
            config,
            directories: ResourceRegistry::new("directory"),
            writers: ResourceRegistry::new("writer"),
            handles: ReadHandleTracker::new(),
            executive,
        })
    }

    /// Announce this node and run the first election evaluation.
    pub fn start(&self) -> ReplicaResult<LeaderState> {
        self.executive.start()
    }

    #[must_use]
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    #[must_use]
    pub fn executive(&self) -> &Executive {
        &self.executive
    }

    #[must_use]
    pub fn read_handles(&self) -> &ReadHandleTracker {
        &self.handles
    }

    // ─── Directories ────────────────────────────────────────────────────

    /// The synchronizing facade for a master/cache pair, created on first
    /// access. The identity (and registry key) is the master's: the
    /// master location is the logical index.
    pub fn directory_for(
        &self,
        master_root: &Path,
        cache_root: &Path,
    ) -> ReplicaResult<Arc<SyncDirectory>> {
        // Materialize the root before deriving the identity, so the key
        // is the canonical spelling and later lookups agree with it.
        std::fs::create_dir_all(master_root)?;
        let key = DirectoryIdentity::from_path(master_root);
        self.directories.get_or_create(&key, || {
            let master: Arc<dyn Directory> = Arc::new(FsDirectory::open(master_root)?);
            let cache: Arc<dyn Directory> = Arc::new(FsDirectory::open(cache_root)?);
            Ok(SyncDirectory::new(
                master,
                cache,
                Arc::new(TantivyGenerationProbe),
                &self.config,
            ))
        })
    }

    /// Lookup-only access for maintenance paths.
    pub fn existing_directory(&self, key: &DirectoryIdentity) -> ReplicaResult<Arc<SyncDirectory>> {
        self.directories.require_existing(key)
    }

    // ─── Write handles ──────────────────────────────────────────────────

    /// The write handle for `key`, created on first demand — but only on
    /// the elected leader. At most one live handle exists per identity.
    pub fn writer_for(
        &self,
        index: &Index,
        key: &DirectoryIdentity,
    ) -> ReplicaResult<Arc<EngineWriter>> {
        self.executive.require_leader()?;
        self.writers.get_or_create(key, || {
            EngineWriter::open(index, key.clone(), self.config.writer_heap_bytes)
        })
    }

    /// Lookup-only access for maintenance paths.
    pub fn existing_writer(&self, key: &DirectoryIdentity) -> ReplicaResult<Arc<EngineWriter>> {
        self.writers.require_existing(key)
    }

    // ─── Read handles ───────────────────────────────────────────────────

    /// Track a freshly opened read handle; invoked whenever a new search
    /// generation is opened.
    pub fn track_read_handle(&self, handle: Arc<dyn SearchHandle>) {
        self.handles.add_open_handle(handle);
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Periodic maintenance: sweep stale read handles and refresh this
    /// node's election records. Never invoked on a per-request path.
    pub fn run_maintenance(&self) -> ReplicaResult<MaintenanceReport> {
        let handles_closed = self.handles.close_stale_handles(self.config.handle_max_age());
        self.executive.refresh()?;
        let leading = self.executive.is_leader()?;
        info!(
            target: "replisearch",
            handles_closed,
            leading,
            "maintenance pass complete"
        );
        Ok(MaintenanceReport {
            handles_closed,
            leading,
        })
    }

    /// Tear down one index: force-close its read handles and drop its
    /// registry entries. Returns the number of handles closed.
    pub fn dispose(&self, key: &DirectoryIdentity) -> usize {
        let closed = self.handles.close_all_for(key);
        self.writers.remove(key);
        self.directories.remove(key);
        info!(target: "replisearch", directory = %key, closed, "directory disposed");
        closed
    }

    /// Full shutdown: close every read handle and resign leadership.
    pub fn shutdown(&self) -> ReplicaResult<usize> {
        let closed = self.handles.close_all();
        self.executive.resign()?;
        Ok(closed)
    }
}
