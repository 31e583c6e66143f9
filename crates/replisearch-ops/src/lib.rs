//! Process-wide lifecycle machinery for replisearch.
//!
//! Three concerns live here, all deliberately injectable rather than
//! static so tests can supply a fresh instance per run:
//!
//! - [`ResourceRegistry`] — atomic get-or-create caches keyed by
//!   [`DirectoryIdentity`](replisearch_core::DirectoryIdentity), used for
//!   directories and write handles (at most one live write handle per
//!   identity).
//! - [`ReadHandleTracker`] — reference-counted, staleness-evicted registry
//!   of outstanding read handles, swept by a periodic maintenance task.
//! - [`Executive`] — the filesystem-lock-file race that decides which
//!   node in a fleet may hold the write handle.

#![allow(
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod executive;
pub mod handles;
pub mod registry;

pub use executive::{Executive, LeaderRecord, LeaderState, NodeRecord, default_machine_id};
pub use handles::ReadHandleTracker;
pub use registry::ResourceRegistry;
