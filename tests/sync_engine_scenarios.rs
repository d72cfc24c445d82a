//! End-to-end scenarios driving `SyncEngine` through the crate's public API,
//! against real temp directories rather than unit-level fixtures.

use std::fs;
use std::thread::sleep;
use std::time::Duration;

use chunkvault::chunker::ChunkerOptions;
use chunkvault::store::{ChunkStore, FsBlobStore, SqliteIndex};
use chunkvault::sync_engine::SyncEngine;

fn small_opts() -> ChunkerOptions {
    ChunkerOptions {
        min_size: 512,
        avg_size: 2048,
        max_size: 8192,
        normalization: chunkvault::chunker::Normalization::Level1,
    }
}

fn new_engine(
    root: &std::path::Path,
    store_root: &std::path::Path,
) -> SyncEngine<FsBlobStore, SqliteIndex> {
    let blob = FsBlobStore::new(store_root.join("chunks")).unwrap();
    let index = SqliteIndex::open(store_root.join("chunks.sqlite3")).unwrap();
    let store = ChunkStore::new(blob, index);
    SyncEngine::new(root, store_root, store, small_opts())
}

fn settle() {
    // mtime comparisons are at one-second resolution.
    sleep(Duration::from_millis(1100));
}

#[test]
fn s1_single_fresh_file_is_chunked_and_reconstitutable() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..50_000u32).map(|n| (n % 251) as u8).collect();
    fs::write(root.path().join("file.bin"), &content).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();

    let fnode_path = store_root.path().join("chunklists/file.bin.json");
    let fnode: serde_json::Value =
        serde_json::from_slice(&fs::read(fnode_path).unwrap()).unwrap();
    assert_eq!(fnode["size"].as_u64().unwrap(), content.len() as u64);
    let chunk_ids = fnode["chunks"].as_array().unwrap();
    assert!(!chunk_ids.is_empty());

    let mut reconstituted = Vec::new();
    for id in chunk_ids {
        let id = id.as_str().unwrap();
        let bytes = fs::read(store_root.path().join("chunks").join(id)).unwrap();
        reconstituted.extend_from_slice(&bytes);
    }
    assert_eq!(reconstituted, content);
}

#[test]
fn s2_duplicate_files_share_a_single_copy_of_each_chunk() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..60_000u32).map(|n| (n % 197) as u8).collect();
    fs::write(root.path().join("a.bin"), &content).unwrap();
    fs::write(root.path().join("b.bin"), &content).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();

    let chunks_dir = store_root.path().join("chunks");
    let blob_count = fs::read_dir(&chunks_dir).unwrap().count();

    let fnode_a: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();
    let chunk_count = fnode_a["chunks"].as_array().unwrap().len();
    // Only one physical copy of each distinct chunk exists on disk even
    // though two files reference the same sequence.
    assert_eq!(blob_count, chunk_count);
}

#[test]
fn s3_deleting_one_duplicate_keeps_the_surviving_files_chunks() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..40_000u32).map(|n| (n % 179) as u8).collect();
    fs::write(root.path().join("a.bin"), &content).unwrap();
    fs::write(root.path().join("b.bin"), &content).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();

    fs::remove_file(root.path().join("a.bin")).unwrap();
    settle();
    engine.run_once().unwrap();

    assert!(!store_root.path().join("chunklists/a.bin.json").exists());
    let fnode_b: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/b.bin.json")).unwrap())
            .unwrap();
    for id in fnode_b["chunks"].as_array().unwrap() {
        let id = id.as_str().unwrap();
        assert!(store_root.path().join("chunks").join(id).exists());
    }
}

#[test]
fn s4_appending_to_a_file_only_touches_the_trailing_chunks() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..40_000u32).map(|n| (n % 151) as u8).collect();
    fs::write(root.path().join("a.bin"), &content).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();
    let before: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();
    let before_chunks: Vec<String> = before["chunks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    settle();
    let mut appended = content.clone();
    appended.extend((0..5_000u32).map(|n| (n % 251) as u8));
    fs::write(root.path().join("a.bin"), &appended).unwrap();
    engine.run_once().unwrap();

    let after: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();
    let after_chunks: Vec<String> = after["chunks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    assert_eq!(after["size"].as_u64().unwrap(), appended.len() as u64);
    // The prefix of chunks shared with the original content should survive
    // untouched; only the trailing portion differs.
    let shared_prefix = before_chunks
        .iter()
        .zip(after_chunks.iter())
        .take_while(|(a, b)| a == b)
        .count();
    assert!(shared_prefix > 0);
}

#[test]
fn s5_mutating_a_prefix_reflows_the_chunk_sequence() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..40_000u32).map(|n| (n % 233) as u8).collect();
    fs::write(root.path().join("a.bin"), &content).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();

    settle();
    let mut mutated = content.clone();
    for byte in mutated.iter_mut().take(100) {
        *byte = byte.wrapping_add(1);
    }
    fs::write(root.path().join("a.bin"), &mutated).unwrap();
    engine.run_once().unwrap();

    let after: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();
    assert_eq!(after["size"].as_u64().unwrap(), mutated.len() as u64);
    for id in after["chunks"].as_array().unwrap() {
        let id = id.as_str().unwrap();
        assert!(store_root.path().join("chunks").join(id).exists());
    }
}

#[test]
fn s6_deleting_every_file_reclaims_every_chunk() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("a.bin"), vec![1u8; 30_000]).unwrap();
    fs::write(root.path().join("b.bin"), vec![2u8; 30_000]).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();

    fs::remove_file(root.path().join("a.bin")).unwrap();
    fs::remove_file(root.path().join("b.bin")).unwrap();
    settle();
    engine.run_once().unwrap();

    assert!(!store_root.path().join("chunklists/a.bin.json").exists());
    assert!(!store_root.path().join("chunklists/b.bin.json").exists());
    let remaining_blobs = fs::read_dir(store_root.path().join("chunks"))
        .unwrap()
        .count();
    assert_eq!(remaining_blobs, 0);
}

#[test]
fn running_twice_with_no_changes_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let store_root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("a.bin"), vec![9u8; 10_000]).unwrap();

    let engine = new_engine(root.path(), store_root.path());
    engine.run_once().unwrap();
    let first: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();

    engine.run_once().unwrap();
    let second: serde_json::Value =
        serde_json::from_slice(&fs::read(store_root.path().join("chunklists/a.bin.json")).unwrap())
            .unwrap();

    assert_eq!(first, second);
}
