//! Unified error type for the replisearch replication layer.
//!
//! Every variant carries an actionable message guiding the consumer toward
//! resolution. The taxonomy distinguishes **transient** conditions (a
//! concurrent writer has not finished; retry or fall back) from
//! **corruption** (generation or metadata unreadable; never silently
//! retried), and keeps mutation-path failures loud: a durable cache copy
//! does not imply the master reflects it.
//!
//! Lock contention is deliberately *not* an error: `IndexLock::obtain`
//! returns `Ok(false)` when the lock is held elsewhere, and the caller must
//! not assume ownership. Only misuse and I/O failures surface as `Err`.

/// Unified error type covering all failure modes across the replication layer.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    // === Storage errors ===
    /// A file is missing or busy because a concurrent operation has not
    /// finished. Expected under normal operation; retry or fall back.
    #[error("Transient storage error at {path}: {detail}. Retry once the concurrent operation completes.")]
    Transient {
        /// File or location involved.
        path: String,
        /// What was observed.
        detail: String,
    },

    /// Index generation or metadata is unreadable or inconsistent. Never
    /// silently retried; the caller decides whether to rebuild.
    #[error("Corrupted index metadata at {path}: {detail}. Do not retry; rebuild or restore the index.")]
    Corruption {
        /// File or location involved.
        path: String,
        /// Nature of the corruption.
        detail: String,
    },

    /// A file name contains path components or is otherwise unusable as a
    /// directory entry.
    #[error("Invalid file name \"{name}\": {reason}. Directory entries must be bare file names.")]
    InvalidFileName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Cloning an open read stream failed on this platform. The caller must
    /// decide the fallback, typically re-issuing `open_read`.
    #[error("Cannot clone the open read stream for {name}: {detail}. Re-issue open_read for an independent stream.")]
    CloneUnsupported {
        /// Name of the file whose stream could not be cloned.
        name: String,
        /// The underlying platform failure.
        detail: String,
    },

    // === Registry errors ===
    /// A maintenance path looked up a resource that was never created.
    /// Maintenance must never implicitly create resources.
    #[error("{registry} registry has no entry for {key}. Create it via get_or_create before maintenance paths touch it.")]
    NotInitialized {
        /// Which registry was consulted.
        registry: &'static str,
        /// The missing key.
        key: String,
    },

    // === Election errors ===
    /// This node is not the elected writer and must not hold a write handle.
    #[error("Node {machine_id} is not the elected writer. Route writes through the current leader or wait for re-election.")]
    NotLeader {
        /// Identity of this node.
        machine_id: String,
    },

    /// More than one leader record was visible after stale cleanup. The node
    /// conservatively treats itself as non-leader until the fleet converges.
    #[error("Election ambiguity: {records} leader records visible after stale cleanup. Treating this node as non-leader.")]
    ElectionAmbiguity {
        /// Number of leader records observed.
        records: usize,
    },

    // === I/O errors ===
    /// Wraps `std::io::Error` for file operations.
    #[error("I/O error: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    // === Configuration errors ===
    /// A configuration value is invalid.
    #[error("Invalid config: {field} = \"{value}\" — {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    // === Engine errors ===
    /// Wraps errors surfaced by the external segment storage engine.
    #[error("{subsystem} error: {source}")]
    Engine {
        /// Which subsystem produced the error (e.g., "tantivy").
        subsystem: &'static str,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience alias used throughout the replisearch crate hierarchy.
pub type ReplicaResult<T> = Result<T, ReplicaError>;
