//! Name search over a live walk of the handle graph.

use crate::error::{HandleFsError, Result};
use crate::filesystem::{join_path, BoxFuture, WalkOptions};
use crate::handle::{DirHandle, Handle};

/// Every non-ignored entry (file or directory) whose own name contains
/// `query`, compared case-insensitively. Results come back in name order,
/// parents before their children. A blank query matches nothing;
/// otherwise surrounding whitespace is part of the needle.
pub async fn search(dir: &DirHandle, query: &str, opts: WalkOptions<'_>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    if query.trim().is_empty() {
        return Ok(out);
    }
    let needle = query.to_lowercase();
    search_into(dir, "", &needle, opts, 0, &mut out).await?;
    Ok(out)
}

fn search_into<'a>(
    dir: &'a DirHandle,
    prefix: &'a str,
    needle: &'a str,
    opts: WalkOptions<'a>,
    depth: usize,
    out: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if depth > opts.max_depth {
            return Err(HandleFsError::DepthExceeded {
                path: prefix.to_string(),
                limit: opts.max_depth,
            });
        }
        let mut entries = dir.entries().await?;
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        for entry in entries {
            let path = join_path(prefix, entry.name());
            if opts.ignore.is_ignored(&path, entry.is_dir()) {
                continue;
            }
            if entry.name().to_lowercase().contains(needle) {
                out.push(path.clone());
            }
            if let Handle::Directory(sub) = entry {
                search_into(&sub, &path, needle, opts, depth + 1, out).await?;
            }
        }
        Ok(())
    })
}
