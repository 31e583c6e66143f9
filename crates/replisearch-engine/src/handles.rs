//! Write and read handle adapters over Tantivy.

use std::path::Path;
use std::sync::{Arc, Mutex};

use replisearch_core::error::{ReplicaError, ReplicaResult};
use replisearch_core::traits::SearchHandle;
use replisearch_core::types::DirectoryIdentity;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Schema;
use tantivy::{Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument};
use tracing::debug;

fn engine_err<E>(source: E) -> ReplicaError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ReplicaError::Engine {
        subsystem: "tantivy",
        source: Box::new(source),
    }
}

/// Open (creating if absent) a Tantivy index on a local path — in this
/// layer's deployment, always the cache side of a directory pair, since
/// that is where the raw engine bytes live.
pub fn open_or_create_index(path: &Path, schema: Schema) -> ReplicaResult<Index> {
    std::fs::create_dir_all(path)?;
    let dir = MmapDirectory::open(path).map_err(engine_err)?;
    Index::open_or_create(dir, schema).map_err(engine_err)
}

// ─── Write handle ───────────────────────────────────────────────────────────

/// The single write handle for one directory identity.
///
/// Tantivy enforces one `IndexWriter` per physical index; the write-handle
/// registry enforces one `EngineWriter` per [`DirectoryIdentity`], created
/// by a factory on first demand.
pub struct EngineWriter {
    directory: DirectoryIdentity,
    writer: Mutex<IndexWriter>,
}

impl std::fmt::Debug for EngineWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineWriter")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl EngineWriter {
    /// Obtain the engine's write handle with the given heap budget.
    pub fn open(
        index: &Index,
        directory: DirectoryIdentity,
        heap_bytes: usize,
    ) -> ReplicaResult<Self> {
        let writer = index.writer(heap_bytes).map_err(engine_err)?;
        debug!(target: "replisearch", directory = %directory, heap_bytes, "write handle opened");
        Ok(Self {
            directory,
            writer: Mutex::new(writer),
        })
    }

    /// The index this handle mutates.
    #[must_use]
    pub fn directory(&self) -> &DirectoryIdentity {
        &self.directory
    }

    /// Queue one document for the next commit.
    pub fn add_document(&self, document: TantivyDocument) -> ReplicaResult<u64> {
        self.lock_writer().add_document(document).map_err(engine_err)
    }

    /// Commit queued documents; returns the new committed opstamp, which
    /// is the generation the probes will observe.
    pub fn commit(&self) -> ReplicaResult<u64> {
        let opstamp = self.lock_writer().commit().map_err(engine_err)?;
        debug!(target: "replisearch", directory = %self.directory, opstamp, "commit");
        Ok(opstamp)
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, IndexWriter> {
        self.writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ─── Read handle ────────────────────────────────────────────────────────────

/// An open search view over one committed generation.
///
/// Registered with the read-handle lifecycle tracker on open; the tracker
/// and any searching callers share it via `Arc`, and the underlying
/// engine view closes when the last owner drops.
pub struct SearcherHandle {
    directory: DirectoryIdentity,
    searcher: Searcher,
}

impl std::fmt::Debug for SearcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearcherHandle")
            .field("directory", &self.directory)
            .field("num_docs", &self.searcher.num_docs())
            .finish()
    }
}

impl SearcherHandle {
    /// The engine's search view.
    #[must_use]
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }
}

impl SearchHandle for SearcherHandle {
    fn directory(&self) -> &DirectoryIdentity {
        &self.directory
    }
}

/// Open a read handle over the current committed generation of `index`.
pub fn open_searcher(
    index: &Index,
    directory: &DirectoryIdentity,
) -> ReplicaResult<Arc<SearcherHandle>> {
    let reader: tantivy::IndexReader = index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()
        .map_err(engine_err)?;
    let searcher = reader.searcher();
    debug!(
        target: "replisearch",
        directory = %directory,
        num_docs = searcher.num_docs(),
        "read handle opened"
    );
    Ok(Arc::new(SearcherHandle {
        directory: directory.clone(),
        searcher,
    }))
}
