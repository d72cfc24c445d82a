//! Compares two hierarchy snapshots and classifies every file as new,
//! modified, or deleted.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::Result;
use crate::fnode::resolve;
use crate::hierarchy::Node;

/// Files classified by a single diff pass, each a leaf `Node` owned by
/// whichever tree it came from (`new_files`/`modified_files` from the new
/// tree, `deleted_files` from the old tree).
#[derive(Debug, Default)]
pub struct DiffResult {
    pub new_files: Vec<Node>,
    pub modified_files: Vec<Node>,
    pub deleted_files: Vec<Node>,
}

/// Diff `old_root` against `new_root`. `time_old` is the unix-seconds
/// timestamp the old snapshot was captured at; a file's mtime strictly after
/// it marks the file modified. `live_root` is the directory the new tree was
/// scanned from, used to stat files for their mtime.
pub fn diff_trees(
    old_root: &Node,
    new_root: &Node,
    time_old: u64,
    live_root: &Path,
) -> Result<DiffResult> {
    let mut result = DiffResult::default();
    diff_level(old_root, new_root, time_old, live_root, &mut result)?;
    Ok(result)
}

fn push_subtree(node: &Node, into: &mut Vec<Node>) {
    if node.is_dir {
        for child in &node.children {
            push_subtree(child, into);
        }
    } else {
        into.push(node.clone());
    }
}

fn diff_level(
    old_dir: &Node,
    new_dir: &Node,
    time_old: u64,
    live_root: &Path,
    result: &mut DiffResult,
) -> Result<()> {
    let old_by_path: HashMap<&str, &Node> = old_dir
        .children
        .iter()
        .map(|n| (n.path.as_str(), n))
        .collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for child in &new_dir.children {
        if let Some(&old_child) = old_by_path.get(child.path.as_str()) {
            seen.insert(child.path.as_str());
            match (old_child.is_dir, child.is_dir) {
                (true, true) => {
                    diff_level(old_child, child, time_old, live_root, result)?;
                }
                (false, false) => {
                    let full_path = resolve(live_root, &child.path);
                    let modified = std::fs::metadata(&full_path)?
                        .modified()?
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs();
                    if modified > time_old {
                        result.modified_files.push(child.clone());
                    }
                }
                _ => {
                    // kind mismatch: file <-> directory, treat as delete+create
                    push_subtree(old_child, &mut result.deleted_files);
                    push_subtree(child, &mut result.new_files);
                }
            }
        } else {
            push_subtree(child, &mut result.new_files);
        }
    }

    for old_child in &old_dir.children {
        if !seen.contains(old_child.path.as_str()) {
            push_subtree(old_child, &mut result.deleted_files);
        }
    }

    Ok(())
}
