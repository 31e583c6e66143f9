//! Tracing conventions for replisearch.
//!
//! Consumers bring their own `tracing` subscriber; this module only pins
//! the target prefix and span names so logs stay filterable and stable
//! across the crate hierarchy:
//!
//! ```text
//! RUST_LOG=replisearch=debug
//! ```

use tracing::Level;

/// Target prefix used by all replisearch tracing spans and events.
pub const TARGET_PREFIX: &str = "replisearch";

/// Standard span names used across the replication layer.
pub mod span_names {
    /// Dirty-state recomputation (generation probe on both sides).
    pub const SYNC_CHECK: &str = "replisearch::sync_check";
    /// Copy-on-read master→cache transfer for one file.
    pub const PULL: &str = "replisearch::pull";
    /// Copy-on-write cache→master push on stream close.
    pub const PUSH: &str = "replisearch::push";
    /// Compound lock obtain/release.
    pub const LOCK: &str = "replisearch::lock";
    /// One leader-election race evaluation.
    pub const ELECTION: &str = "replisearch::election";
    /// Read-handle staleness sweep.
    pub const SWEEP: &str = "replisearch::sweep";
    /// Periodic maintenance pass (sweep + record refresh).
    pub const MAINTENANCE: &str = "replisearch::maintenance";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
/// Returns `None` for unrecognized strings.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Recommended `tracing::Level` for the current environment.
///
/// Checks `REPLISEARCH_LOG_LEVEL` first, then falls back to the provided
/// default.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("REPLISEARCH_LOG_LEVEL")
        .ok()
        .and_then(|raw| parse_level(&raw))
        .unwrap_or(default)
}
