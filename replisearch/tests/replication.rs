//! Master/cache replication integration tests.
//!
//! Exercises the synchronizing facade against a real Tantivy index: a
//! cold cache warms itself file-by-file through copy-on-read, metadata
//! routing follows the in-sync judgement, and writes through the facade
//! land on both sides.

use std::io::{Read, Write};
use std::sync::Arc;

use replisearch::prelude::*;
use replisearch::{SyncDirectory, open_or_create_index, open_searcher};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{STORED, STRING, Schema, TEXT};
use tantivy::{Index, TantivyDocument};

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn test_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("content", TEXT | STORED);
    builder.build()
}

/// Create a committed Tantivy index at `path` holding `docs` documents.
fn seed_index(path: &std::path::Path, docs: &[(&str, &str)]) -> Index {
    let schema = test_schema();
    let index = open_or_create_index(path, schema.clone()).expect("open index");
    let id_field = schema.get_field("id").expect("id");
    let content_field = schema.get_field("content").expect("content");

    let mut writer = index.writer(15_000_000).expect("writer");
    for (id, content) in docs {
        let mut doc = TantivyDocument::new();
        doc.add_text(id_field, *id);
        doc.add_text(content_field, *content);
        writer.add_document(doc).expect("add");
    }
    writer.commit().expect("commit");
    index
}

/// Pull every master-visible file into the cache through the facade.
fn warm_cache(sync: &SyncDirectory) {
    let entries = sync.master().list_all().expect("list master");
    for entry in entries {
        let mut stream = sync.open_read(&entry.name).expect("open_read");
        let mut sink = Vec::new();
        stream.read_to_end(&mut sink).expect("drain");
    }
}

fn node_fixture(scratch: &std::path::Path) -> ReplicaNode {
    let records: Arc<dyn Directory> = Arc::new(
        replisearch::FsDirectory::open(&scratch.join("records")).expect("records dir"),
    );
    let node = ReplicaNode::new(records, "test-node", ReplicaConfig::default()).expect("node");
    node.start().expect("start");
    node
}

// ═══════════════════════════════════════════════════════════════════════════
// Cold cache → warm cache
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn cold_cache_warms_and_serves_search() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let master_root = scratch.path().join("master");
    let cache_root = scratch.path().join("cache");

    seed_index(
        &master_root,
        &[
            ("d1", "Rust ownership prevents data races at compile time"),
            ("d2", "Distributed consensus ensures fault tolerance"),
            ("d3", "Database indexing with B-trees gives fast lookups"),
        ],
    );

    let node = node_fixture(scratch.path());
    let sync = node
        .directory_for(&master_root, &cache_root)
        .expect("directory");

    // Cold cache: the generations cannot match, so metadata serves master.
    assert!(!sync.in_sync(), "cold cache must not be judged in sync");
    let master_names: Vec<_> = sync
        .master()
        .list_all()
        .expect("list")
        .into_iter()
        .map(|e| e.name)
        .collect();
    let facade_names: Vec<_> = sync
        .list_all()
        .expect("list facade")
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(facade_names, master_names);

    // Copy-on-read pulls each file; afterwards both sides are at the same
    // committed generation and the judgement recomputes to in-sync.
    warm_cache(&sync);
    assert!(sync.in_sync(), "warmed cache must be in sync");
    assert!(sync.metrics_snapshot().pulls >= master_names.len() as u64);

    // The cache now holds a complete, searchable index.
    let schema = test_schema();
    let cache_index = open_or_create_index(&cache_root, schema.clone()).expect("open cache");
    let identity = DirectoryIdentity::from_path(&cache_root);
    let handle = open_searcher(&cache_index, &identity).expect("searcher");
    assert_eq!(handle.searcher().num_docs(), 3);

    let content_field = schema.get_field("content").expect("content");
    let parser = QueryParser::for_index(&cache_index, vec![content_field]);
    let query = parser.parse_query("consensus").expect("parse");
    let hits = handle
        .searcher()
        .search(&query, &TopDocs::with_limit(5))
        .expect("search");
    assert_eq!(hits.len(), 1);
}

#[test]
fn master_advances_then_cache_catches_up() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let master_root = scratch.path().join("master");
    let cache_root = scratch.path().join("cache");

    let master_index = seed_index(&master_root, &[("d1", "first generation content")]);

    let node = node_fixture(scratch.path());
    let sync = node
        .directory_for(&master_root, &cache_root)
        .expect("directory");
    warm_cache(&sync);
    assert!(sync.in_sync());

    // The authoritative writer commits a second generation on the master.
    let schema = test_schema();
    let id_field = schema.get_field("id").expect("id");
    let mut writer = master_index.writer(15_000_000).expect("writer");
    let mut doc = TantivyDocument::new();
    doc.add_text(id_field, "d2");
    writer.add_document(doc).expect("add");
    writer.commit().expect("commit");

    // A mutation observed through the facade re-dirties the judgement;
    // the recompute sees diverged generations and routes to master.
    let mut aux = sync.open_write("aux.marker").expect("open_write");
    aux.write_all(b"0123456789").expect("write");
    aux.close().expect("close");
    assert!(!sync.in_sync(), "diverged generations must not be in sync");

    // Catching up file-by-file restores the in-sync judgement.
    warm_cache(&sync);
    assert!(sync.in_sync(), "cache caught up to the second generation");
    assert_eq!(sync.file_length("aux.marker").expect("length"), 10);
}

// ═══════════════════════════════════════════════════════════════════════════
// Writes through the facade
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn facade_write_round_trips_and_replicates() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let master_root = scratch.path().join("master");
    let cache_root = scratch.path().join("cache");

    let node = node_fixture(scratch.path());
    let sync = node
        .directory_for(&master_root, &cache_root)
        .expect("directory");

    let payload = b"bytes that must survive the round trip";
    let mut stream = sync.open_write("doc.bin").expect("open_write");
    stream.write_all(payload).expect("write");
    stream.close().expect("close");

    // Read back through the facade.
    let mut read = sync.open_read("doc.bin").expect("open_read");
    let mut out = Vec::new();
    read.read_to_end(&mut out).expect("read");
    assert_eq!(out, payload);

    // Both physical sides hold the bytes.
    assert!(sync.cache().file_exists("doc.bin").expect("cache"));
    assert!(sync.master().file_exists("doc.bin").expect("master"));
    assert_eq!(sync.master().file_length("doc.bin").expect("len") as usize, payload.len());
}

#[test]
fn delete_through_facade_clears_both_sides() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let master_root = scratch.path().join("master");
    let cache_root = scratch.path().join("cache");

    let node = node_fixture(scratch.path());
    let sync = node
        .directory_for(&master_root, &cache_root)
        .expect("directory");

    let mut stream = sync.open_write("victim").expect("open_write");
    stream.write_all(b"short lived").expect("write");
    stream.close().expect("close");

    sync.delete("victim").expect("delete");
    assert!(!sync.cache().file_exists("victim").expect("cache"));
    assert!(!sync.master().file_exists("victim").expect("master"));
    assert!(!sync.file_exists("victim").expect("facade"));
}

#[test]
fn cloned_read_stream_is_independent() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let master_root = scratch.path().join("master");
    let cache_root = scratch.path().join("cache");

    let node = node_fixture(scratch.path());
    let sync = node
        .directory_for(&master_root, &cache_root)
        .expect("directory");

    let mut stream = sync.open_write("shared").expect("open_write");
    stream.write_all(b"abcdefgh").expect("write");
    stream.close().expect("close");

    let mut original = sync.open_read("shared").expect("open_read");
    let mut first_half = [0_u8; 4];
    original.read_exact(&mut first_half).expect("read half");

    let mut clone = original.try_clone().expect("clone");
    let mut from_clone = Vec::new();
    clone.read_to_end(&mut from_clone).expect("read clone");
    assert_eq!(from_clone, b"efgh");

    let mut from_original = Vec::new();
    original.read_to_end(&mut from_original).expect("read original");
    assert_eq!(from_original, b"efgh", "clone must not disturb the original");
}
