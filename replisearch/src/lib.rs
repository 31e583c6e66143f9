//! # replisearch
//!
//! A search-index library layered on Tantivy that keeps a fast local
//! cache of index files coherent with an authoritative (often slow or
//! remote) master location, serializes concurrent access to that cache,
//! tracks write and read handle lifetimes across the whole process, and
//! elects a single writer across a fleet of nodes sharing one master.
//!
//! ```text
//!           ┌────────────── SyncDirectory ──────────────┐
//!  caller ──┤ metadata: cache when in-sync, else master │
//!           │ open_read: copy-on-read  (master → cache) │
//!           │ open_write: cache first, push on close    │
//!           └──────┬──────────────────────────┬─────────┘
//!              FsDirectory                FsDirectory
//!               (master)                   (cache)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use replisearch::prelude::*;
//! use replisearch::{FsDirectory, ReplicaNode};
//!
//! let records: Arc<dyn Directory> = Arc::new(FsDirectory::open("/mnt/index".as_ref())?);
//! let node = ReplicaNode::new(records, default_machine_id(), ReplicaConfig::from_env())?;
//! node.start()?;
//!
//! let dir = node.directory_for("/mnt/index".as_ref(), "/var/cache/index".as_ref())?;
//! if node.executive().is_leader()? {
//!     // only the elected writer may request a write handle
//! }
//! ```
//!
//! ## Crate Layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `replisearch-core` | Types, traits, errors, config |
//! | `replisearch-replica` | Sync facade, copy streams, mutexes, compound lock |
//! | `replisearch-ops` | Registries, read-handle tracker, leader election |
//! | `replisearch-engine` | Tantivy generation probe and handle adapters |
//!
//! ## Key Types
//!
//! - [`ReplicaNode`] — owns the process-wide registries and the executive
//! - [`SyncDirectory`] — the master/cache synchronizing directory facade
//! - [`Executive`] — best-effort filesystem-race leader election
//! - [`ReadHandleTracker`] — staleness-swept read-handle registry

#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod service;

pub use replisearch_core::{
    Directory, DirectoryIdentity, FileEntry, GenerationProbe, IndexLock, ReadStream,
    ReplicaConfig, ReplicaError, ReplicaResult, SearchHandle, SegmentGeneration, WriteStream,
};
pub use replisearch_engine::{
    EngineWriter, SearcherHandle, TantivyGenerationProbe, open_or_create_index, open_searcher,
};
pub use replisearch_ops::{
    Executive, LeaderRecord, LeaderState, NodeRecord, ReadHandleTracker, ResourceRegistry,
    default_machine_id,
};
pub use replisearch_replica::{
    CompoundLock, CompressionPolicy, FileMutexRegistry, FsDirectory, SyncDirectory,
    SyncStateTracker,
};
pub use service::{MaintenanceReport, ReplicaNode};

/// Commonly used imports for consumers.
pub mod prelude {
    pub use replisearch_core::{
        Directory, DirectoryIdentity, ReplicaConfig, ReplicaError, ReplicaResult,
    };
    pub use replisearch_ops::{LeaderState, default_machine_id};

    pub use crate::service::ReplicaNode;
}
