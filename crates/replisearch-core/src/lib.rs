//! Core traits, types, and error types for the replisearch replicated-index library.
//!
//! This crate defines the shared interfaces (`Directory`, `ReadStream`,
//! `WriteStream`, `IndexLock`, `GenerationProbe`, `SearchHandle`), the key
//! types (`DirectoryIdentity`, `FileEntry`, `SegmentGeneration`), the unified
//! error type (`ReplicaError`), and runtime configuration used across all
//! replisearch crates.
//!
//! It has minimal external dependencies and is intended to be depended on by
//! every other crate in the workspace.

#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod config;
pub mod error;
pub mod tracing_config;
pub mod traits;
pub mod types;

pub use config::ReplicaConfig;
pub use error::{ReplicaError, ReplicaResult};
pub use traits::{Directory, GenerationProbe, IndexLock, ReadStream, SearchHandle, WriteStream};
pub use types::{DirectoryIdentity, FileEntry, SegmentGeneration};
