//! Content-addressed byte storage.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checksum::ChunkId;
use crate::error::Result;

/// Stores and retrieves chunk bytes by content address.
pub trait BlobStore {
    fn put(&self, id: ChunkId, bytes: &[u8]) -> Result<()>;
    fn path(&self, id: ChunkId) -> PathBuf;
    fn remove(&self, id: ChunkId) -> Result<()>;
    fn exists(&self, id: ChunkId) -> bool;
}

/// Blobs live at `<root>/<hex-id>`, one file per chunk.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FsBlobStore { root })
    }

    /// Iterate over every id currently present as a blob on disk, for use by
    /// `ChunkStore::gc_orphans`.
    pub fn iter_ids(&self) -> Result<Vec<ChunkId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = name.parse::<ChunkId>() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, id: ChunkId, bytes: &[u8]) -> Result<()> {
        let path = self.path(id);
        if path.exists() {
            // Idempotent under matching content: same id implies same bytes.
            return Ok(());
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn path(&self, id: ChunkId) -> PathBuf {
        self.root.join(id.to_hex())
    }

    fn remove(&self, id: ChunkId) -> Result<()> {
        let path = self.path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn exists(&self, id: ChunkId) -> bool {
        self.path(id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("chunks")).unwrap();
        let id = crate::checksum::checksum(b"hello");
        store.put(id, b"hello").unwrap();
        assert!(store.exists(id));
        assert_eq!(fs::read(store.path(id)).unwrap(), b"hello");
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("chunks")).unwrap();
        let id = crate::checksum::checksum(b"hello");
        store.put(id, b"hello").unwrap();
        store.put(id, b"hello").unwrap();
        assert_eq!(fs::read(store.path(id)).unwrap(), b"hello");
    }

    #[test]
    fn remove_deletes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("chunks")).unwrap();
        let id = crate::checksum::checksum(b"hello");
        store.put(id, b"hello").unwrap();
        store.remove(id).unwrap();
        assert!(!store.exists(id));
    }

    #[test]
    fn iter_ids_lists_all_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("chunks")).unwrap();
        let a = crate::checksum::checksum(b"a");
        let b = crate::checksum::checksum(b"b");
        store.put(a, b"a").unwrap();
        store.put(b, b"b").unwrap();
        let mut ids = store.iter_ids().unwrap();
        ids.sort_by_key(|id| id.to_hex());
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.to_hex());
        assert_eq!(ids, expected);
    }
}
