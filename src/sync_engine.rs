//! Applies a directory diff against the chunk store: ingests new and
//! modified files, releases deleted files' chunks, and rewrites the
//! hierarchy snapshot at the end of every pass.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::checksum::{checksum, ChunkId};
use crate::chunker::{ChunkerOptions, StreamCdc};
use crate::diff::diff_trees;
use crate::error::Result;
use crate::fnode::{multiplicities, resolve, FNodeStore, FileChunkList};
use crate::hierarchy::{Hierarchy, Node};
use crate::store::{BlobStore, ChunkStore, RefcountIndex};

pub struct SyncEngine<B: BlobStore, I: RefcountIndex> {
    root: PathBuf,
    hierarchy_path: PathBuf,
    fnodes: FNodeStore,
    store: ChunkStore<B, I>,
    chunker_opts: ChunkerOptions,
}

impl<B: BlobStore, I: RefcountIndex> SyncEngine<B, I> {
    pub fn new(
        root: impl Into<PathBuf>,
        store_root: impl AsRef<Path>,
        store: ChunkStore<B, I>,
        chunker_opts: ChunkerOptions,
    ) -> Self {
        let store_root = store_root.as_ref();
        SyncEngine {
            root: root.into(),
            hierarchy_path: store_root.join("hierarchy.json"),
            fnodes: FNodeStore::new(store_root.join("chunklists")),
            store,
            chunker_opts,
        }
    }

    /// Split a file into chunks without touching the store. Returns the
    /// chunk ids in stream order, their sizes, and the bytes of each id's
    /// first occurrence (enough to satisfy `add_or_retain` on first sight).
    fn compute_chunks(
        &self,
        path: &Path,
    ) -> Result<(Vec<ChunkId>, Vec<usize>, std::collections::HashMap<ChunkId, Vec<u8>>)> {
        let file = File::open(path)?;
        let chunker = StreamCdc::new(file, self.chunker_opts);
        let mut ids = Vec::new();
        let mut sizes = Vec::new();
        let mut bytes_by_id = std::collections::HashMap::new();
        for chunk in chunker {
            let chunk = chunk?;
            let id = checksum(&chunk.data);
            info!("chunk emitted: id={id} bytes={}", chunk.length);
            sizes.push(chunk.length);
            bytes_by_id.entry(id).or_insert(chunk.data);
            ids.push(id);
        }
        Ok((ids, sizes, bytes_by_id))
    }

    /// Ingest a single new file leaf, or recurse into a new directory's leaves.
    pub fn ingest_new(&self, node: &Node) -> Result<()> {
        if node.is_dir {
            for child in &node.children {
                self.ingest_new(child)?;
            }
            return Ok(());
        }
        let full_path = resolve(&self.root, &node.path);
        let (chunks, sizes, bytes_by_id) = self.compute_chunks(&full_path)?;
        for id in &chunks {
            self.store.add_or_retain(*id, &bytes_by_id[id])?;
        }
        let fnode = FileChunkList::new(node.path.clone(), chunks, &sizes);
        self.fnodes.save(&fnode)?;
        info!("fnode written: {}", node.path);
        Ok(())
    }

    /// Re-chunk a modified file and apply a multiplicity-correct diff of its
    /// old and new chunk sequences against the store.
    pub fn reingest_modified(&self, node: &Node) -> Result<()> {
        let old_fnode = match self.fnodes.load(&node.path) {
            Ok(fnode) => Some(fnode),
            Err(crate::error::Error::Json(_)) => {
                warn!(
                    "fnode codec failure for {}, treating as new file",
                    node.path
                );
                None
            }
            Err(e) => return Err(e),
        };

        let full_path = resolve(&self.root, &node.path);
        let (new_chunks, new_sizes, bytes_by_id) = self.compute_chunks(&full_path)?;

        let old_counts = old_fnode
            .as_ref()
            .map(|f| multiplicities(&f.chunks))
            .unwrap_or_default();
        let new_counts = multiplicities(&new_chunks);

        let mut all_ids: std::collections::HashSet<ChunkId> = old_counts.keys().copied().collect();
        all_ids.extend(new_counts.keys().copied());

        for id in all_ids {
            let old_n = *old_counts.get(&id).unwrap_or(&0) as i64;
            let new_n = *new_counts.get(&id).unwrap_or(&0) as i64;
            let delta = new_n - old_n;
            if delta > 0 {
                for _ in 0..delta {
                    self.store.add_or_retain(id, &bytes_by_id[&id])?;
                }
            } else if delta < 0 {
                for _ in 0..(-delta) {
                    self.store.release(id)?;
                }
            }
        }

        let fnode = FileChunkList::new(node.path.clone(), new_chunks, &new_sizes);
        self.fnodes.save(&fnode)?;
        info!("fnode rewritten: {}", node.path);
        Ok(())
    }

    /// Release every chunk a deleted file referenced (respecting multiplicity)
    /// and remove its FNode.
    pub fn delete_file(&self, node: &Node) -> Result<()> {
        let old_fnode = self.fnodes.load(&node.path)?;
        for id in &old_fnode.chunks {
            self.store.release(*id)?;
        }
        self.fnodes.remove(&node.path)?;
        Ok(())
    }

    /// Run a full sync pass: diff the live tree against the last snapshot,
    /// apply new/modified/deleted in that order, then rewrite the snapshot.
    pub fn run_once(&self) -> Result<()> {
        let old_hierarchy = if !self.hierarchy_path.exists() {
            // No prior pass has ever run; not a codec failure, just a fresh store.
            Hierarchy {
                root: Node::dir(String::new(), Vec::new()),
                time_accessed: 0,
            }
        } else {
            match Hierarchy::load(&self.hierarchy_path) {
                Ok(h) => h,
                Err(crate::error::Error::Json(_)) => {
                    warn!("hierarchy codec failure, treating entire tree as new");
                    Hierarchy {
                        root: Node::dir(String::new(), Vec::new()),
                        time_accessed: 0,
                    }
                }
                Err(e) => return Err(e),
            }
        };

        let new_hierarchy = Hierarchy::scan(&self.root)?;
        let diff = diff_trees(
            &old_hierarchy.root,
            &new_hierarchy.root,
            old_hierarchy.time_accessed,
            &self.root,
        )?;

        info!("sync pass: {} new files", diff.new_files.len());
        for node in &diff.new_files {
            self.ingest_new(node)?;
        }

        info!("sync pass: {} modified files", diff.modified_files.len());
        for node in &diff.modified_files {
            self.reingest_modified(node)?;
        }

        info!("sync pass: {} deleted files", diff.deleted_files.len());
        for node in &diff.deleted_files {
            self.delete_file(node)?;
        }

        new_hierarchy.save(&self.hierarchy_path)?;
        Ok(())
    }
}
