//! Segment-generation probe over Tantivy metadata.

use replisearch_core::error::{ReplicaError, ReplicaResult};
use replisearch_core::traits::{Directory, GenerationProbe};
use replisearch_core::types::SegmentGeneration;
use tracing::debug;

/// Name of the metadata file Tantivy rewrites on every commit.
pub const ENGINE_META_FILE: &str = "meta.json";

/// Reads the committed opstamp out of `meta.json`, through the
/// [`Directory`] contract so the same probe works against master, cache,
/// or the synchronizing facade.
///
/// Any failure — file absent, unreadable, unparseable, opstamp missing —
/// reports [`SegmentGeneration::Unknown`] rather than an error. The
/// dirty-check that consumes this must keep answering while the master is
/// transiently unreachable, and an unknown generation is never judged in
/// sync with anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TantivyGenerationProbe;

impl TantivyGenerationProbe {
    fn committed_opstamp(dir: &dyn Directory) -> ReplicaResult<u64> {
        let mut stream = dir.open_read(ENGINE_META_FILE)?;
        let mut raw = String::new();
        std::io::Read::read_to_string(&mut stream, &mut raw)?;
        let meta: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| ReplicaError::Corruption {
                path: ENGINE_META_FILE.to_owned(),
                detail: e.to_string(),
            })?;
        meta.get("opstamp")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| ReplicaError::Corruption {
                path: ENGINE_META_FILE.to_owned(),
                detail: "opstamp field missing or not an integer".to_owned(),
            })
    }
}

impl GenerationProbe for TantivyGenerationProbe {
    fn current_generation(&self, dir: &dyn Directory) -> SegmentGeneration {
        match Self::committed_opstamp(dir) {
            Ok(opstamp) => SegmentGeneration::At(opstamp),
            Err(e) => {
                debug!(
                    target: "replisearch",
                    directory = %dir.identity(),
                    error = %e,
                    "generation probe failed, reporting unknown"
                );
                SegmentGeneration::Unknown
            }
        }
    }
}
