//! Tantivy bindings for replisearch.
//!
//! The replication layer treats the segment storage engine as an external
//! collaborator: it asks for a write handle, a read handle, and the
//! highest committed generation visible in a location. This crate binds
//! those three seams to Tantivy:
//!
//! - [`TantivyGenerationProbe`] reads the engine's `meta.json` through
//!   the [`Directory`](replisearch_core::Directory) contract and reports
//!   the committed opstamp as the segment generation.
//! - [`EngineWriter`] wraps [`tantivy::IndexWriter`]; the write-handle
//!   registry keeps at most one per directory identity.
//! - [`SearcherHandle`] wraps [`tantivy::Searcher`] for the read-handle
//!   lifecycle tracker.

#![allow(
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod handles;
pub mod probe;

pub use handles::{EngineWriter, SearcherHandle, open_or_create_index, open_searcher};
pub use probe::{ENGINE_META_FILE, TantivyGenerationProbe};
