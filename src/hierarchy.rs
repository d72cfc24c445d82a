//! Frozen directory-tree snapshots, captured via a `walkdir` scan and
//! persisted as JSON so consecutive sync passes can diff against them.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::Result;

/// A single entry in the tree: a leaf file, or a directory with children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn leaf(path: String) -> Self {
        Node {
            path,
            is_dir: false,
            children: Vec::new(),
        }
    }

    pub fn dir(path: String, children: Vec<Node>) -> Self {
        Node {
            path,
            is_dir: true,
            children,
        }
    }

    /// All file leaves reachable under this node, depth-first.
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        if self.is_dir {
            for child in &self.children {
                child.collect_leaves(out);
            }
        } else {
            out.push(self);
        }
    }
}

/// A point-in-time snapshot of a directory tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hierarchy {
    pub root: Node,
    pub time_accessed: u64,
}

impl Hierarchy {
    /// Walk `root` depth-first via `walkdir` and build a snapshot. Paths are
    /// stored relative to `root`, with `/`-separated segments regardless of
    /// host platform.
    pub fn scan(root: &Path) -> Result<Self> {
        let root_node = scan_dir(root, root)?;
        let time_accessed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(Hierarchy {
            root: root_node,
            time_accessed,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .join("/")
}

fn scan_dir(root: &Path, dir: &Path) -> Result<Node> {
    let mut children = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        let rel_path = relative_slash_path(root, path);
        if entry.file_type().is_dir() {
            children.push(scan_dir(root, path)?);
        } else {
            children.push(Node::leaf(rel_path));
        }
    }
    let rel_path = relative_slash_path(root, dir);
    Ok(Node::dir(rel_path, children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    #[test]
    fn scan_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("sub")).unwrap();
        stdfs::write(dir.path().join("a.txt"), b"a").unwrap();
        stdfs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let tree = Hierarchy::scan(dir.path()).unwrap();
        let leaves: Vec<_> = tree.root.leaves().iter().map(|n| n.path.clone()).collect();
        assert!(leaves.contains(&"a.txt".to_string()));
        assert!(leaves.contains(&"sub/b.txt".to_string()));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("a.txt"), b"a").unwrap();
        let tree = Hierarchy::scan(dir.path()).unwrap();
        let snapshot_path = dir.path().join("hierarchy.json");
        tree.save(&snapshot_path).unwrap();
        let loaded = Hierarchy::load(&snapshot_path).unwrap();
        assert_eq!(loaded.root, tree.root);
    }
}
