//! Master/cache synchronization layer for replisearch.
//!
//! An index lives in two places: an authoritative (often slow or remote)
//! **master** location and a fast local **cache**. This crate keeps the two
//! coherent and presents them as a single
//! [`Directory`](replisearch_core::Directory):
//!
//! - [`SyncDirectory`] — the facade. Metadata reads are served from the
//!   cache while the two sides are provably at the same segment
//!   generation, from the master otherwise. Reads pull bytes master→cache
//!   on demand; writes land in the cache first and push to the master when
//!   the stream closes.
//! - [`SyncStateTracker`] — the cached, lazily-recomputed in-sync
//!   judgement behind that routing decision.
//! - [`FileMutexRegistry`] — one transfer at a time per file.
//! - [`CompoundLock`] — an index lock held iff both the master-side and
//!   cache-side locks are held.
//! - [`FsDirectory`] — the plain local-filesystem backing used for both
//!   roots.
//!
//! Within one directory only single-file atomicity is guaranteed: each
//! file's mutex serializes its own transfers, and a reader racing a
//! multi-file commit may observe a partially synced file set. The engine's
//! own commit protocol ensures a reader only opens a generation once its
//! full file set is present wherever it reads from.

#![allow(
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod compound_lock;
pub mod directory;
pub mod dirty;
pub mod fs;
pub mod metrics;
pub mod mutex;
pub mod transfer;

pub use compound_lock::CompoundLock;
pub use directory::SyncDirectory;
pub use dirty::SyncStateTracker;
pub use fs::FsDirectory;
pub use metrics::{ReplicaMetrics, ReplicaMetricsSnapshot};
pub use mutex::FileMutexRegistry;
pub use transfer::{CompressionPolicy, ReplicatedWriter, needs_refresh, pull_to_cache};
