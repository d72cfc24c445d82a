//! The content-addressed chunk store: a [`BlobStore`] for bytes plus a
//! [`RefcountIndex`] tracking how many live references each chunk has.

pub mod blob;
pub mod index;

pub use blob::{BlobStore, FsBlobStore};
pub use index::{RefcountIndex, SqliteIndex};

use crate::checksum::ChunkId;
use crate::error::Result;

/// Combines a blob store and a refcount index behind the add/release
/// operations the sync engine actually calls. Assumes exactly one sync pass
/// runs at a time (§5 of the design): no locking beyond what SQLite itself
/// provides for a single connection.
pub struct ChunkStore<B: BlobStore, I: RefcountIndex> {
    blob: B,
    index: I,
}

impl<B: BlobStore, I: RefcountIndex> ChunkStore<B, I> {
    pub fn new(blob: B, index: I) -> Self {
        ChunkStore { blob, index }
    }

    /// Add a reference to `id`, writing its bytes on first encounter.
    pub fn add_or_retain(&self, id: ChunkId, bytes: &[u8]) -> Result<()> {
        if self.index.exists(id)? {
            self.index.inc(id)
        } else {
            self.blob.put(id, bytes)?;
            self.index.insert(id)
        }
    }

    /// Release a reference to `id`, reclaiming the blob once the count hits
    /// zero.
    pub fn release(&self, id: ChunkId) -> Result<()> {
        self.index.dec(id)?;
        if self.index.get(id)? == 0 {
            self.blob.remove(id)?;
            self.index.delete(id)?;
        }
        Ok(())
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }

    pub fn index(&self) -> &I {
        &self.index
    }
}

impl<I: RefcountIndex> ChunkStore<FsBlobStore, I> {
    /// Scan `chunks/` for blobs with no matching refcount row and delete
    /// them. Not invoked automatically from `run_once`; an operator runs it
    /// out-of-band to reclaim blobs orphaned by a mid-pass crash.
    pub fn gc_orphans(&self) -> Result<Vec<ChunkId>> {
        let mut reclaimed = Vec::new();
        for id in self.blob.iter_ids()? {
            if !self.index.exists(id)? {
                self.blob.remove(id)?;
                reclaimed.push(id);
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;

    fn store(dir: &tempfile::TempDir) -> ChunkStore<FsBlobStore, SqliteIndex> {
        let blob = FsBlobStore::new(dir.path().join("chunks")).unwrap();
        let index = SqliteIndex::open_memory().unwrap();
        ChunkStore::new(blob, index)
    }

    #[test]
    fn add_or_retain_increments_on_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let id = checksum(b"x");
        store.add_or_retain(id, b"x").unwrap();
        assert_eq!(store.index().get(id).unwrap(), 1);
        store.add_or_retain(id, b"x").unwrap();
        assert_eq!(store.index().get(id).unwrap(), 2);
        assert!(store.blob().exists(id));
    }

    #[test]
    fn release_reclaims_blob_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let id = checksum(b"x");
        store.add_or_retain(id, b"x").unwrap();
        store.add_or_retain(id, b"x").unwrap();
        store.release(id).unwrap();
        assert!(store.blob().exists(id));
        assert_eq!(store.index().get(id).unwrap(), 1);
        store.release(id).unwrap();
        assert!(!store.blob().exists(id));
        assert_eq!(store.index().get(id).unwrap(), 0);
    }

    #[test]
    fn gc_orphans_removes_unindexed_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let id = checksum(b"orphan");
        store.blob().put(id, b"orphan").unwrap();
        assert!(!store.index().exists(id).unwrap());
        let reclaimed = store.gc_orphans().unwrap();
        assert_eq!(reclaimed, vec![id]);
        assert!(!store.blob().exists(id));
    }
}
