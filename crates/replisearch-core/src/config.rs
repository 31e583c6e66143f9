//! Configuration for the replication layer.
//!
//! [`ReplicaConfig`] contains all tuning knobs for cache refresh, handle
//! staleness, and leader-election record lifetimes. All fields have
//! sensible defaults; override selectively or via environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplicaError, ReplicaResult};

/// Configuration for cache coherence, handle lifecycle, and election.
///
/// # Environment Variable Overrides
///
/// | Variable                              | Field                    | Default |
/// |---------------------------------------|--------------------------|---------|
/// | `REPLISEARCH_MODIFIED_TOLERANCE_SECS` | `modified_tolerance_secs`| `2`     |
/// | `REPLISEARCH_HANDLE_MAX_AGE_SECS`     | `handle_max_age_secs`    | `300`   |
/// | `REPLISEARCH_RECORD_STALENESS_SECS`   | `record_staleness_secs`  | `60`    |
/// | `REPLISEARCH_WRITER_HEAP_BYTES`       | `writer_heap_bytes`      | `50_000_000` |
/// | `REPLISEARCH_MACHINE_ID`              | (election machine id)    | hostname |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Modification-instant slack for the copy-on-read refresh decision.
    /// Master and cache timestamp independently and not atomically, so
    /// instants within this window count as equal. Default: 2.
    pub modified_tolerance_secs: u64,

    /// Age past which a tracked read handle becomes eligible for the
    /// staleness sweep. The newest handle is always exempt. Default: 300.
    pub handle_max_age_secs: u64,

    /// Age past which election records (announce and leader lock) are
    /// treated as abandoned and removed during re-election. Default: 60.
    pub record_staleness_secs: u64,

    /// File-name suffixes stored deflated on the master. Files matching a
    /// suffix are inflated on pull and deflated in memory before push.
    /// Default: empty (no compression).
    pub compressed_suffixes: Vec<String>,

    /// Heap budget handed to the engine write handle. Default: 50 MB.
    pub writer_heap_bytes: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            modified_tolerance_secs: 2,
            handle_max_age_secs: 300,
            record_staleness_secs: 60,
            compressed_suffixes: Vec::new(),
            writer_heap_bytes: 50_000_000,
        }
    }
}

impl ReplicaConfig {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_u64("REPLISEARCH_MODIFIED_TOLERANCE_SECS") {
            config.modified_tolerance_secs = v;
        }
        if let Some(v) = env_u64("REPLISEARCH_HANDLE_MAX_AGE_SECS") {
            config.handle_max_age_secs = v;
        }
        if let Some(v) = env_u64("REPLISEARCH_RECORD_STALENESS_SECS") {
            config.record_staleness_secs = v;
        }
        if let Some(v) = env_u64("REPLISEARCH_WRITER_HEAP_BYTES") {
            config.writer_heap_bytes = usize::try_from(v).unwrap_or(usize::MAX);
        }
        config
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> ReplicaResult<()> {
        if self.record_staleness_secs == 0 {
            return Err(ReplicaError::InvalidConfig {
                field: "record_staleness_secs".into(),
                value: "0".into(),
                reason: "a zero cutoff would reap live election records on every pass".into(),
            });
        }
        if self.handle_max_age_secs == 0 {
            return Err(ReplicaError::InvalidConfig {
                field: "handle_max_age_secs".into(),
                value: "0".into(),
                reason: "a zero age would close read handles that are still warming up".into(),
            });
        }
        if self.writer_heap_bytes < 15_000_000 {
            return Err(ReplicaError::InvalidConfig {
                field: "writer_heap_bytes".into(),
                value: self.writer_heap_bytes.to_string(),
                reason: "the engine rejects writer heaps under 15 MB".into(),
            });
        }
        for suffix in &self.compressed_suffixes {
            if suffix.is_empty() {
                return Err(ReplicaError::InvalidConfig {
                    field: "compressed_suffixes".into(),
                    value: String::new(),
                    reason: "an empty suffix would match every file".into(),
                });
            }
        }
        Ok(())
    }

    /// `modified_tolerance_secs` as a [`Duration`].
    #[must_use]
    pub fn modified_tolerance(&self) -> Duration {
        Duration::from_secs(self.modified_tolerance_secs)
    }

    /// `handle_max_age_secs` as a [`Duration`].
    #[must_use]
    pub fn handle_max_age(&self) -> Duration {
        Duration::from_secs(self.handle_max_age_secs)
    }

    /// `record_staleness_secs` as a [`Duration`].
    #[must_use]
    pub fn record_staleness(&self) -> Duration {
        Duration::from_secs(self.record_staleness_secs)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}
