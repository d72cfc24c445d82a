//! Per-file chunk lists ("FNodes"), persisted as JSON in a shadow tree that
//! mirrors the live directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checksum::ChunkId;
use crate::error::Result;

/// The ordered chunk sequence that reconstitutes one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChunkList {
    pub path: String,
    pub size: u64,
    pub chunks: Vec<ChunkId>,
}

impl FileChunkList {
    pub fn new(path: String, chunks: Vec<ChunkId>, chunk_sizes: &[usize]) -> Self {
        let size = chunk_sizes.iter().map(|&n| n as u64).sum();
        FileChunkList { path, size, chunks }
    }
}

/// Where FNodes live relative to a store root: `chunklists/<mirrored path>.json`.
pub struct FNodeStore {
    root: PathBuf,
}

impl FNodeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FNodeStore { root: root.into() }
    }

    fn shadow_path(&self, rel_path: &str) -> PathBuf {
        self.root.join(format!("{rel_path}.json"))
    }

    pub fn load(&self, rel_path: &str) -> Result<FileChunkList> {
        let bytes = fs::read(self.shadow_path(rel_path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.shadow_path(rel_path).exists()
    }

    pub fn save(&self, node: &FileChunkList) -> Result<()> {
        let path = self.shadow_path(&node.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(node)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn remove(&self, rel_path: &str) -> Result<()> {
        let path = self.shadow_path(rel_path);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Count occurrences of each chunk id, preserving multiplicity, for the
/// reingest diff in `sync_engine`.
pub fn multiplicities(chunks: &[ChunkId]) -> std::collections::HashMap<ChunkId, u64> {
    let mut counts = std::collections::HashMap::new();
    for id in chunks {
        *counts.entry(*id).or_insert(0) += 1;
    }
    counts
}

/// Join a root and a `/`-separated relative path into a platform path.
pub fn resolve(root: &Path, rel_path: &str) -> PathBuf {
    let mut full = root.to_path_buf();
    for segment in rel_path.split('/') {
        full.push(segment);
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FNodeStore::new(dir.path());
        let node = FileChunkList::new("a/b.txt".into(), vec![checksum(b"x")], &[1]);
        store.save(&node).unwrap();
        assert!(store.exists("a/b.txt"));
        let loaded = store.load("a/b.txt").unwrap();
        assert_eq!(loaded, node);
    }

    #[test]
    fn remove_deletes_fnode() {
        let dir = tempfile::tempdir().unwrap();
        let store = FNodeStore::new(dir.path());
        let node = FileChunkList::new("a.txt".into(), vec![], &[]);
        store.save(&node).unwrap();
        store.remove("a.txt").unwrap();
        assert!(!store.exists("a.txt"));
    }

    #[test]
    fn multiplicities_counts_repeats() {
        let a = checksum(b"a");
        let b = checksum(b"b");
        let counts = multiplicities(&[a, a, b]);
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 1);
    }
}
