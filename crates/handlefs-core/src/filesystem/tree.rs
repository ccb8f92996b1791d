//! TreeBuilder: directory handle → nested [`TreeNode`].

use crate::error::{HandleFsError, Result};
use crate::filesystem::{join_path, BoxFuture, TreeEntry, TreeNode, WalkOptions};
use crate::handle::{DirHandle, Handle};

/// Enumerate `dir` and every directory below it.
///
/// `prefix` is the relative path of `dir` itself (empty for the root).
/// Children are visited in name order so the result never depends on the
/// host's enumeration order. Ignored entries are skipped without being
/// descended into.
pub fn build_tree<'a>(
    dir: &'a DirHandle,
    prefix: &'a str,
    opts: WalkOptions<'a>,
    depth: usize,
) -> BoxFuture<'a, Result<TreeNode>> {
    Box::pin(async move {
        if depth > opts.max_depth {
            return Err(HandleFsError::DepthExceeded {
                path: prefix.to_string(),
                limit: opts.max_depth,
            });
        }

        let mut entries = dir.entries().await?;
        entries.sort_by(|a, b| a.name().cmp(b.name()));

        let mut node = TreeNode::new();
        for entry in entries {
            let path = join_path(prefix, entry.name());
            if opts.ignore.is_ignored(&path, entry.is_dir()) {
                continue;
            }
            match entry {
                Handle::File(file) => node.insert(file.name(), TreeEntry::File(path)),
                Handle::Directory(sub) => {
                    let subtree = build_tree(&sub, &path, opts, depth + 1).await?;
                    node.insert(sub.name(), TreeEntry::Directory(subtree));
                }
            }
        }
        Ok(node)
    })
}
