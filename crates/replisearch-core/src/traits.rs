//! Shared interfaces between the replication layer and its collaborators.
//!
//! The segment storage engine is an external collaborator: replisearch only
//! ever asks it for byte-stream handles against named files, the highest
//! committed generation visible in a location, and a lock primitive with
//! obtain/release/is-locked semantics. Everything here is object-safe so
//! master and cache backings can be swapped freely.

use std::io::{Read, Seek, Write};
use std::time::SystemTime;

use crate::error::ReplicaResult;
use crate::types::{DirectoryIdentity, FileEntry, SegmentGeneration};

// ─── Streams ────────────────────────────────────────────────────────────────

/// An open, seekable read stream over one file.
pub trait ReadStream: Read + Seek + Send {
    /// Clone this stream into an independent handle with its own position.
    ///
    /// Platform failure to clone surfaces as
    /// [`ReplicaError::CloneUnsupported`](crate::ReplicaError::CloneUnsupported);
    /// the caller decides the fallback, typically a fresh `open_read`.
    fn try_clone(&self) -> ReplicaResult<Box<dyn ReadStream>>;
}

/// An open write stream over one file.
///
/// Bytes are not considered published until [`WriteStream::close`] returns
/// `Ok`. Dropping an unclosed stream abandons the write; implementations
/// log the abandonment but must not panic.
pub trait WriteStream: Write + Send {
    /// Flush, finalize, and (where the backing requires it) replicate the
    /// written bytes. Idempotent: a second call is a no-op.
    fn close(&mut self) -> ReplicaResult<()>;
}

// ─── Directory ──────────────────────────────────────────────────────────────

/// Uniform virtual-file-directory interface, independent of backing store.
///
/// Implemented by plain filesystem roots and by the master/cache
/// synchronizing facade alike, so indexing and search components consume
/// one surface regardless of where the bytes physically live.
pub trait Directory: Send + Sync + std::fmt::Debug {
    /// Canonical identity of this location.
    fn identity(&self) -> &DirectoryIdentity;

    /// Enumerate all files currently visible.
    fn list_all(&self) -> ReplicaResult<Vec<FileEntry>>;

    /// Whether `name` currently exists.
    fn file_exists(&self, name: &str) -> ReplicaResult<bool>;

    /// Stored length of `name`, in bytes.
    fn file_length(&self, name: &str) -> ReplicaResult<u64>;

    /// Last-modified instant of `name`.
    fn file_modified(&self, name: &str) -> ReplicaResult<SystemTime>;

    /// Open `name` for reading.
    fn open_read(&self, name: &str) -> ReplicaResult<Box<dyn ReadStream>>;

    /// Open `name` for writing, truncating any previous content.
    fn open_write(&self, name: &str) -> ReplicaResult<Box<dyn WriteStream>>;

    /// Remove `name`. Removing an absent file succeeds.
    fn delete(&self, name: &str) -> ReplicaResult<()>;

    /// Build (but do not obtain) the lock named `name` in this location.
    fn make_lock(&self, name: &str) -> Box<dyn IndexLock>;
}

// ─── Locks ──────────────────────────────────────────────────────────────────

/// A named index lock with obtain/release/is-locked semantics.
///
/// Contention is not an error: `obtain` returns `Ok(false)` when the lock
/// is held elsewhere and the caller must not assume ownership. `release`
/// is idempotent and safe to call on a lock that was never obtained.
pub trait IndexLock: Send + Sync + std::fmt::Debug {
    /// Attempt to take the lock. `Ok(true)` on success, `Ok(false)` on
    /// contention, `Err` only for I/O failure.
    fn obtain(&self) -> ReplicaResult<bool>;

    /// Whether anyone (this handle included) currently holds the lock.
    fn is_locked(&self) -> ReplicaResult<bool>;

    /// Give the lock back if this handle holds it.
    fn release(&self) -> ReplicaResult<()>;
}

// ─── Generation probe ───────────────────────────────────────────────────────

/// Reports the highest committed segment generation visible in a location.
///
/// Probe failures are mapped to [`SegmentGeneration::Unknown`], never
/// surfaced as errors: the dirty-check that consumes this must remain
/// usable while the master is transiently unreachable.
pub trait GenerationProbe: Send + Sync + std::fmt::Debug {
    fn current_generation(&self, dir: &dyn Directory) -> SegmentGeneration;
}

// ─── Search handles ─────────────────────────────────────────────────────────

/// An open read handle over a committed search generation.
///
/// Tracked by the read-handle lifecycle tracker as `Arc<dyn SearchHandle>`;
/// the tracker's clone is the reference it holds, and the final owner
/// closes the underlying engine view on drop.
pub trait SearchHandle: Send + Sync + std::fmt::Debug {
    /// The index this handle reads from.
    fn directory(&self) -> &DirectoryIdentity;
}
