//! Key types shared across the replication layer.

use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ─── DirectoryIdentity ──────────────────────────────────────────────────────

/// Canonical key for one logical index location.
///
/// Every process-wide registry (directories, write handles, read handles)
/// is keyed by this identity. Two paths that resolve to the same physical
/// location produce the same identity, so handle caches never split one
/// index across two entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryIdentity(String);

impl DirectoryIdentity {
    /// Build an identity from an already-canonical string key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the identity of a filesystem location.
    ///
    /// Canonicalizes the path when possible so symlinked and relative
    /// spellings of the same directory collapse to one key. A path that
    /// does not exist yet falls back to its literal spelling.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.canonicalize() {
            Ok(canonical) => Self(canonical.to_string_lossy().into_owned()),
            Err(_) => Self(path.to_string_lossy().into_owned()),
        }
    }

    /// The canonical key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DirectoryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FileEntry ──────────────────────────────────────────────────────────────

/// One file as observed in a single store (master or cache).
///
/// The same name is observed independently on both sides; the two
/// observations are compared by the copy-on-read refresh decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Bare file name (no path components).
    pub name: String,
    /// Length in bytes as stored.
    pub length: u64,
    /// Last-modified instant as reported by the backing store.
    pub modified: SystemTime,
}

// ─── SegmentGeneration ──────────────────────────────────────────────────────

/// The highest committed segment generation visible in one location.
///
/// A probe that fails for any reason reports `Unknown` rather than an
/// error: the dirty-check must stay resilient to transient master
/// unavailability, and an unknown generation is never judged in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentGeneration {
    /// The generation could not be determined.
    Unknown,
    /// The committed generation marker visible in the location.
    At(u64),
}

impl SegmentGeneration {
    /// Whether the probe produced a usable generation.
    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(self, Self::At(_))
    }

    /// Whether two locations are provably at the same point in history.
    ///
    /// `Unknown` never matches anything, including another `Unknown`.
    #[must_use]
    pub const fn matches(self, other: Self) -> bool {
        matches!((self, other), (Self::At(a), Self::At(b)) if a == b)
    }
}

impl std::fmt::Display for SegmentGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::At(generation) => write!(f, "{generation}"),
        }
    }
}
